//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! ARP 协议
//!
//! 每个目标 IP 在两张缓存中呈现三种状态：
//! - 未知：ARP 表和待发送缓存中都没有
//! - 等待：待发送缓存中有一个数据报，请求已广播
//! - 已解析：ARP 表中有对应的 MAC 地址
//!
//! 参考: RFC 826, include/uapi/linux/if_arp.h

use core::net::Ipv4Addr;

use log::{debug, trace, warn};

use crate::errno::NetError;
use crate::net::buffer::{EthProtocol, PacketBuf};
use crate::net::ethernet::{ethernet_out, MacAddr, MacDisplay, ETH_ALEN, ETH_BROADCAST};
use crate::net::ipv4::IP_ALEN;
use crate::net::stack::NetStack;

/// ARP 硬件类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ArpHrd {
    /// 以太网
    ARPHRD_ETHER = 1,
}

/// ARP 操作类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ArpOp {
    /// ARP 请求
    ARPOP_REQUEST = 1,
    /// ARP 响应
    ARPOP_REPLY = 2,
}

impl ArpOp {
    /// 从 u16 转换
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(ArpOp::ARPOP_REQUEST),
            2 => Some(ArpOp::ARPOP_REPLY),
            _ => None,
        }
    }
}

/// ARP 报文 (以太网 + IPv4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// 操作类型
    pub op: ArpOp,
    /// 发送方硬件地址 (MAC)
    pub ar_sha: MacAddr,
    /// 发送方协议地址 (IP)
    pub ar_sip: Ipv4Addr,
    /// 目标硬件地址 (MAC)
    pub ar_tha: MacAddr,
    /// 目标协议地址 (IP)
    pub ar_tip: Ipv4Addr,
}

impl ArpPacket {
    /// ARP 报文总长度 (以太网 + IPv4)
    pub const LEN: usize = 28;

    /// 解析 ARP 报文
    ///
    /// # 说明
    /// 硬件类型、协议类型、地址长度或操作码不符时返回 `Malformed`
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < Self::LEN {
            return Err(NetError::Malformed);
        }

        let ar_hrd = u16::from_be_bytes([data[0], data[1]]);
        let ar_pro = u16::from_be_bytes([data[2], data[3]]);
        let ar_hln = data[4] as usize;
        let ar_pln = data[5] as usize;
        if ar_hrd != ArpHrd::ARPHRD_ETHER as u16
            || ar_pro != EthProtocol::ETH_P_IP.to_u16()
            || ar_hln != ETH_ALEN
            || ar_pln != IP_ALEN
        {
            return Err(NetError::Malformed);
        }

        let op = ArpOp::from_u16(u16::from_be_bytes([data[6], data[7]]))
            .ok_or(NetError::Malformed)?;

        let mut ar_sha = [0u8; ETH_ALEN];
        let mut ar_tha = [0u8; ETH_ALEN];
        ar_sha.copy_from_slice(&data[8..14]);
        ar_tha.copy_from_slice(&data[18..24]);

        Ok(Self {
            op,
            ar_sha,
            ar_sip: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            ar_tha,
            ar_tip: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    /// 写入 `dst` 的前 `LEN` 字节
    pub fn write(&self, dst: &mut [u8]) {
        dst[0..2].copy_from_slice(&(ArpHrd::ARPHRD_ETHER as u16).to_be_bytes());
        dst[2..4].copy_from_slice(&EthProtocol::ETH_P_IP.to_u16().to_be_bytes());
        dst[4] = ETH_ALEN as u8;
        dst[5] = IP_ALEN as u8;
        dst[6..8].copy_from_slice(&(self.op as u16).to_be_bytes());
        dst[8..14].copy_from_slice(&self.ar_sha);
        dst[14..18].copy_from_slice(&self.ar_sip.octets());
        dst[18..24].copy_from_slice(&self.ar_tha);
        dst[24..28].copy_from_slice(&self.ar_tip.octets());
    }
}

/// 构造并发送 ARP 报文，发送方为本机
fn arp_out(
    stack: &mut NetStack,
    op: ArpOp,
    dest: MacAddr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Result<(), NetError> {
    let pkt = ArpPacket {
        op,
        ar_sha: stack.config.mac,
        ar_sip: stack.config.ip,
        ar_tha: target_mac,
        ar_tip: target_ip,
    };

    let mut buf = PacketBuf::alloc(ArpPacket::LEN);
    pkt.write(buf.as_mut_slice());
    ethernet_out(stack, buf, dest, EthProtocol::ETH_P_ARP.to_u16())
}

/// 广播 ARP 请求
pub fn arp_request(stack: &mut NetStack, target_ip: Ipv4Addr) -> Result<(), NetError> {
    trace!("arp: who-has {}", target_ip);
    arp_out(stack, ArpOp::ARPOP_REQUEST, ETH_BROADCAST, [0; ETH_ALEN], target_ip)
}

/// 向请求方发送 ARP 响应
pub fn arp_reply(
    stack: &mut NetStack,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Result<(), NetError> {
    trace!("arp: {} is-at {}", stack.config.ip, MacDisplay(&stack.config.mac));
    arp_out(stack, ArpOp::ARPOP_REPLY, target_mac, target_mac, target_ip)
}

/// 解析目标地址并发送 IP 数据报
///
/// # 参数
/// - `buf`: 完整的 IP 数据报
/// - `dst`: 下一跳 IP 地址
///
/// # 说明
/// - 已解析：立即封装成以太网帧发送
/// - 未知：缓存数据报副本并广播 ARP 请求
/// - 等待中：每个目标只有一个缓存位置，新数据报被丢弃并返回 `PendingBusy`
pub fn arp_resolve_and_send(
    stack: &mut NetStack,
    buf: PacketBuf,
    dst: Ipv4Addr,
) -> Result<(), NetError> {
    let now = stack.now_ms();

    if let Some(mac) = stack.arp_table.get(&dst, now).copied() {
        return ethernet_out(stack, buf, mac, EthProtocol::ETH_P_IP.to_u16());
    }

    if stack.arp_pending.contains(&dst, now) {
        warn!("arp: {} still unresolved, datagram dropped", dst);
        stack.stats.arp_pending_dropped += 1;
        return Err(NetError::PendingBusy);
    }

    if let Err(err) = stack.arp_pending.set(dst, buf, now) {
        warn!("arp: no pending slot for {}: {}", dst, err);
        stack.stats.arp_pending_dropped += 1;
        return Err(err);
    }

    arp_request(stack, dst)
}

/// 接收 ARP 报文
///
/// # 参数
/// - `buf`: 去掉以太网头部的 ARP 报文
/// - `src_mac`: 以太网源地址
///
/// # 说明
/// 1. 校验报文字段，不合法则丢弃
/// 2. 记录 (发送方 IP -> 以太网源地址)，不论报文是请求还是响应
/// 3. 如果发送方有等待中的数据报，立即发出并删除缓存
/// 4. 如果是询问本机 IP 的请求，回复 ARP 响应
pub fn arp_in(stack: &mut NetStack, buf: PacketBuf, src_mac: MacAddr) {
    let pkt = match ArpPacket::parse(buf.as_slice()) {
        Ok(pkt) => pkt,
        Err(_) => {
            debug!("arp: malformed packet from {}, dropped", MacDisplay(&src_mac));
            stack.stats.rx_dropped += 1;
            return;
        }
    };

    trace!(
        "arp: {:?} {} ({}) -> {}",
        pkt.op,
        pkt.ar_sip,
        MacDisplay(&src_mac),
        pkt.ar_tip
    );

    let now = stack.now_ms();

    // 0.0.0.0 是地址探测，不学习
    if !pkt.ar_sip.is_unspecified() {
        if let Err(err) = stack.arp_table.set(pkt.ar_sip, src_mac, now) {
            warn!("arp: cannot learn {}: {}", pkt.ar_sip, err);
        }

        if let Some(pending) = stack.arp_pending.take(&pkt.ar_sip, now) {
            trace!("arp: {} resolved, replay pending datagram", pkt.ar_sip);
            let _ = ethernet_out(stack, pending, src_mac, EthProtocol::ETH_P_IP.to_u16());
        }
    }

    if pkt.op == ArpOp::ARPOP_REQUEST && pkt.ar_tip == stack.config.ip {
        let _ = arp_reply(stack, src_mac, pkt.ar_sip);
    }
}
