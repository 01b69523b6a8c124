//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! ICMP 协议
//!
//! 只实现回显应答和差错报文 (目标不可达、超时)。
//! 参考: RFC 792, include/uapi/linux/icmp.h

use core::net::Ipv4Addr;

use log::{debug, trace, warn};

use crate::net::buffer::{IpProtocol, PacketBuf};
use crate::net::ipv4::checksum::{ip_checksum, verify_ip_checksum};
use crate::net::ipv4::IPHDR_LEN;
use crate::net::stack::NetStack;

/// ICMP 头部长度
pub const ICMP_HLEN: usize = 8;

/// 差错报文引用原始数据报负载的字节数
pub const ICMP_QUOTE_LEN: usize = 8;

/// 回显应答
pub const ICMP_ECHOREPLY: u8 = 0;
/// 目标不可达
pub const ICMP_DEST_UNREACH: u8 = 3;
/// 回显请求
pub const ICMP_ECHO: u8 = 8;
/// 超时
pub const ICMP_TIME_EXCEEDED: u8 = 11;

/// 协议不可达
pub const ICMP_PROT_UNREACH: u8 = 2;
/// 端口不可达
pub const ICMP_PORT_UNREACH: u8 = 3;
/// 传输中 TTL 超时
pub const ICMP_EXC_TTL: u8 = 0;

/// ICMP 回显头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpEcho {
    /// 类型
    pub icmp_type: u8,
    /// 代码
    pub code: u8,
    /// 校验和
    pub checksum: u16,
    /// 标识符
    pub id: u16,
    /// 序列号
    pub seq: u16,
}

impl IcmpEcho {
    /// 解析回显头部，长度不足时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ICMP_HLEN {
            return None;
        }

        Some(Self {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            id: u16::from_be_bytes([data[4], data[5]]),
            seq: u16::from_be_bytes([data[6], data[7]]),
        })
    }
}

/// 接收 ICMP 报文
///
/// # 说明
/// 回显请求在原缓冲区中改写为回显应答（标识符、序列号和数据保持不变），
/// 重新计算校验和后发回请求方。其他类型只记录。
pub fn icmp_in(stack: &mut NetStack, mut buf: PacketBuf, src_ip: Ipv4Addr) {
    let echo = match IcmpEcho::parse(buf.as_slice()) {
        Some(echo) => echo,
        None => {
            debug!("icmp: short message from {}, dropped", src_ip);
            stack.stats.rx_dropped += 1;
            return;
        }
    };

    if !verify_ip_checksum(buf.as_slice()) {
        debug!("icmp: bad checksum from {}, dropped", src_ip);
        stack.stats.rx_dropped += 1;
        return;
    }

    if echo.icmp_type != ICMP_ECHO {
        trace!(
            "icmp: type {} code {} from {} ignored",
            echo.icmp_type,
            echo.code,
            src_ip
        );
        return;
    }

    trace!(
        "icmp: echo request from {} id {} seq {}",
        src_ip,
        echo.id,
        echo.seq
    );

    let data = buf.as_mut_slice();
    data[0] = ICMP_ECHOREPLY;
    data[1] = 0;
    data[2..4].copy_from_slice(&[0, 0]);
    let check = ip_checksum(data);
    data[2..4].copy_from_slice(&check.to_be_bytes());

    // 发送失败已在下层记录
    let _ = stack.ip_out(buf, src_ip, IpProtocol::IPPROTO_ICMP.to_u8());
}

/// 发送 ICMP 差错报文
///
/// # 参数
/// - `orig`: 出错的数据报，窗口从其 IP 头部开始
/// - `dst`: 差错报文的接收方 (原数据报的源地址)
///
/// # 说明
/// 报文携带原 IP 头部加上负载的前 8 字节
fn icmp_send_error(
    stack: &mut NetStack,
    orig: &PacketBuf,
    dst: Ipv4Addr,
    icmp_type: u8,
    code: u8,
) {
    if dst.is_broadcast() || dst.is_unspecified() {
        return;
    }

    let data = orig.as_slice();
    let ihl = data.first().map_or(IPHDR_LEN, |b| (*b & 0x0F) as usize * 4);
    let quote_len = core::cmp::min(data.len(), ihl + ICMP_QUOTE_LEN);

    let mut buf = PacketBuf::alloc(ICMP_HLEN + quote_len);
    let msg = buf.as_mut_slice();
    msg[0] = icmp_type;
    msg[1] = code;
    msg[ICMP_HLEN..].copy_from_slice(&data[..quote_len]);
    let check = ip_checksum(msg);
    msg[2..4].copy_from_slice(&check.to_be_bytes());

    match stack.ip_out(buf, dst, IpProtocol::IPPROTO_ICMP.to_u8()) {
        Ok(()) => stack.stats.icmp_errors_sent += 1,
        Err(err) => warn!(
            "icmp: failed to send type {} code {} to {}: {}",
            icmp_type, code, dst, err
        ),
    }
}

/// 发送目标不可达报文
pub fn icmp_dest_unreachable(stack: &mut NetStack, orig: &PacketBuf, dst: Ipv4Addr, code: u8) {
    icmp_send_error(stack, orig, dst, ICMP_DEST_UNREACH, code);
}

/// 发送 TTL 超时报文
pub fn icmp_time_exceeded(stack: &mut NetStack, orig: &PacketBuf, dst: Ipv4Addr) {
    icmp_send_error(stack, orig, dst, ICMP_TIME_EXCEEDED, ICMP_EXC_TTL);
}
