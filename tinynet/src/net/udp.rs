//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! UDP 协议
//!
//! 按目标端口把数据报分发给登记的处理函数，没有处理函数时回复
//! ICMP 端口不可达。
//! 参考: RFC 768, include/uapi/linux/udp.h

use alloc::sync::Arc;
use core::net::Ipv4Addr;

use log::{debug, trace, warn};

use crate::errno::NetError;
use crate::net::buffer::{IpProtocol, PacketBuf};
use crate::net::icmp::{icmp_dest_unreachable, ICMP_PORT_UNREACH};
use crate::net::ipv4::checksum::{ip_checksum, write_pseudo_header, PSEUDO_HDR_LEN};
use crate::net::ipv4::IP_MAX_PAYLOAD;
use crate::net::stack::NetStack;

/// UDP 头部长度
pub const UDP_HLEN: usize = 8;

/// 单个 UDP 数据报的最大负载
pub const UDP_MAX_PAYLOAD: usize = IP_MAX_PAYLOAD - UDP_HLEN;

/// UDP 端口号
pub type UdpPort = u16;

/// UDP 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHdr {
    /// 源端口
    pub source: UdpPort,
    /// 目标端口
    pub dest: UdpPort,
    /// 长度 (头部加数据)
    pub len: u16,
    /// 校验和
    pub check: u16,
}

impl UdpHdr {
    /// 解析 UDP 头部
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < UDP_HLEN {
            return Err(NetError::Malformed);
        }

        Ok(Self {
            source: u16::from_be_bytes([data[0], data[1]]),
            dest: u16::from_be_bytes([data[2], data[3]]),
            len: u16::from_be_bytes([data[4], data[5]]),
            check: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// 写入 `dst` 的前 `UDP_HLEN` 字节
    pub fn write(&self, dst: &mut [u8]) {
        dst[0..2].copy_from_slice(&self.source.to_be_bytes());
        dst[2..4].copy_from_slice(&self.dest.to_be_bytes());
        dst[4..6].copy_from_slice(&self.len.to_be_bytes());
        dst[6..8].copy_from_slice(&self.check.to_be_bytes());
    }
}

/// 交给处理函数的数据报
///
/// 负载只在调用期间有效
#[derive(Debug)]
pub struct UdpDatagram<'a> {
    /// 负载
    pub payload: &'a [u8],
    /// UDP 头部声明的长度 (含头部)
    pub len: usize,
    /// 源 IP 地址
    pub src_ip: Ipv4Addr,
    /// 源端口
    pub src_port: UdpPort,
    /// 目标端口
    pub dst_port: UdpPort,
}

/// UDP 端口处理函数
pub type UdpHandler = Arc<dyn Fn(&mut NetStack, &UdpDatagram<'_>) + Send + Sync>;

/// 计算 UDP 校验和
///
/// # 参数
/// - `buf`: 窗口从 UDP 头部开始，到数据结尾
///
/// # 说明
/// 临时在窗口前压入 12 字节伪头部参与计算，完成后恢复被覆盖的字节并弹出。
/// 接收路径上被覆盖的是 IP 头部的尾部，恢复后仍可以被 ICMP 引用。
pub fn udp_checksum(
    buf: &mut PacketBuf,
    saddr: Ipv4Addr,
    daddr: Ipv4Addr,
) -> Result<u16, NetError> {
    let udp_len = u16::try_from(buf.len()).map_err(|_| NetError::InvalidArgument)?;

    let mut saved = [0u8; PSEUDO_HDR_LEN];
    let pseudo = buf.push_header(PSEUDO_HDR_LEN)?;
    saved.copy_from_slice(pseudo);
    write_pseudo_header(
        pseudo,
        saddr,
        daddr,
        IpProtocol::IPPROTO_UDP.to_u8(),
        udp_len,
    );

    let check = ip_checksum(buf.as_slice());

    buf.as_mut_slice()[..PSEUDO_HDR_LEN].copy_from_slice(&saved);
    buf.pop_header(PSEUDO_HDR_LEN)?;
    Ok(check)
}

/// 接收 UDP 数据报
///
/// # 说明
/// - 声明长度小于头部或大于收到的字节数时丢弃，多余的字节被截掉
/// - 校验和为 0 表示发送方没有计算，直接接受
/// - 找到端口处理函数则剥离头部后调用；否则回复 ICMP 端口不可达
pub fn udp_in(stack: &mut NetStack, mut buf: PacketBuf, src_ip: Ipv4Addr) {
    let hdr = match UdpHdr::parse(buf.as_slice()) {
        Ok(hdr) => hdr,
        Err(_) => {
            debug!("udp: short datagram from {}, dropped", src_ip);
            stack.stats.rx_dropped += 1;
            return;
        }
    };

    let len = hdr.len as usize;
    if len < UDP_HLEN || len > buf.len() {
        debug!(
            "udp: bad length {} (received {}) from {}, dropped",
            len,
            buf.len(),
            src_ip
        );
        stack.stats.rx_dropped += 1;
        return;
    }
    if buf.truncate(len).is_err() {
        stack.stats.rx_dropped += 1;
        return;
    }

    if hdr.check != 0 {
        let local_ip = stack.config.ip;
        match udp_checksum(&mut buf, src_ip, local_ip) {
            Ok(0) => {}
            _ => {
                debug!("udp: bad checksum from {}:{}, dropped", src_ip, hdr.source);
                stack.stats.rx_dropped += 1;
                return;
            }
        }
    }

    let now = stack.now_ms();
    let handler = match stack.udp_table.get(&hdr.dest, now).cloned() {
        Some(handler) => handler,
        None => {
            debug!("udp: port {} unreachable", hdr.dest);
            if buf.push_network_header().is_ok() {
                icmp_dest_unreachable(stack, &buf, src_ip, ICMP_PORT_UNREACH);
            }
            return;
        }
    };

    trace!(
        "udp: {}:{} -> port {} len {}",
        src_ip,
        hdr.source,
        hdr.dest,
        len
    );

    if buf.pop_header(UDP_HLEN).is_err() {
        stack.stats.rx_dropped += 1;
        return;
    }

    let dgram = UdpDatagram {
        payload: buf.as_slice(),
        len,
        src_ip,
        src_port: hdr.source,
        dst_port: hdr.dest,
    };
    handler(stack, &dgram);
}

/// 发送 UDP 数据报
///
/// # 参数
/// - `buf`: 负载
/// - `src_port`: 源端口
/// - `dst_ip`: 目标 IP 地址
/// - `dst_port`: 目标端口
pub fn udp_out(
    stack: &mut NetStack,
    mut buf: PacketBuf,
    src_port: UdpPort,
    dst_ip: Ipv4Addr,
    dst_port: UdpPort,
) -> Result<(), NetError> {
    if buf.len() > UDP_MAX_PAYLOAD {
        warn!(
            "udp: {} byte payload to {}:{} exceeds {}, not sent",
            buf.len(),
            dst_ip,
            dst_port,
            UDP_MAX_PAYLOAD
        );
        return Err(NetError::InvalidArgument);
    }
    let len = u16::try_from(buf.len() + UDP_HLEN).map_err(|_| NetError::InvalidArgument)?;

    let hdr = UdpHdr {
        source: src_port,
        dest: dst_port,
        len,
        check: 0,
    };
    match buf.push_header(UDP_HLEN) {
        Ok(raw) => hdr.write(raw),
        Err(err) => {
            warn!("udp: no headroom for header to {}:{}: {}", dst_ip, dst_port, err);
            stack.stats.tx_dropped += 1;
            return Err(err);
        }
    }

    let local_ip = stack.config.ip;
    let mut check = match udp_checksum(&mut buf, local_ip, dst_ip) {
        Ok(check) => check,
        Err(err) => {
            warn!("udp: no headroom for pseudo header: {}", err);
            stack.stats.tx_dropped += 1;
            return Err(err);
        }
    };
    // 0 表示没有校验和
    if check == 0 {
        check = 0xFFFF;
    }
    buf.as_mut_slice()[6..8].copy_from_slice(&check.to_be_bytes());

    trace!("udp: port {} -> {}:{} len {}", src_port, dst_ip, dst_port, len);

    stack.ip_out(buf, dst_ip, IpProtocol::IPPROTO_UDP.to_u8())
}

/// 登记端口处理函数，已登记的端口被替换
pub fn udp_open(stack: &mut NetStack, port: UdpPort, handler: UdpHandler) -> Result<(), NetError> {
    let now = stack.now_ms();
    stack.udp_table.set(port, handler, now).map_err(|err| {
        warn!("udp: cannot open port {}: {}", port, err);
        err
    })
}

/// 注销端口处理函数
pub fn udp_close(stack: &mut NetStack, port: UdpPort) {
    stack.udp_table.delete(&port);
}

/// 复制数据到新缓冲区并发送
pub fn udp_send(
    stack: &mut NetStack,
    data: &[u8],
    src_port: UdpPort,
    dst_ip: Ipv4Addr,
    dst_port: UdpPort,
) -> Result<(), NetError> {
    let buf = PacketBuf::from_slice(data);
    udp_out(stack, buf, src_port, dst_ip, dst_port)
}
