//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IPv4 协议
//!
//! 单接口、单地址的主机协议栈：不转发，不重组分片。
//! 参考: RFC 791, include/uapi/linux/ip.h

pub mod checksum;

use core::net::Ipv4Addr;

use bitflags::bitflags;
use log::{debug, trace, warn};

use crate::errno::NetError;
use crate::net::arp::arp_resolve_and_send;
use crate::net::buffer::{EthProtocol, PacketBuf};
use crate::net::ethernet::{ethernet_out, MacAddr, MacDisplay, ETH_BROADCAST};
use crate::net::icmp::{icmp_dest_unreachable, icmp_time_exceeded, ICMP_PROT_UNREACH};
use crate::net::stack::NetStack;

use self::checksum::{ip_checksum, verify_ip_checksum};

/// IPv4 地址长度
pub const IP_ALEN: usize = 4;

/// IPv4 头部长度 (无选项)
pub const IPHDR_LEN: usize = 20;

/// IPv4 最小 MTU (RFC 791)
pub const IP_MIN_MTU: u16 = 68;

/// IPv4 最大 MTU
pub const IP_MAX_MTU: u16 = 65535;

/// 单个 IPv4 数据报可承载的最大负载
pub const IP_MAX_PAYLOAD: usize = IP_MAX_MTU as usize - IPHDR_LEN;

/// IPv4 版本号
pub const IP_VERSION: u8 = 4;

/// 分片偏移掩码 (以 8 字节为单位)
pub const IP_OFFSET_MASK: u16 = 0x1FFF;

bitflags! {
    /// IPv4 分片标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpFlags: u16 {
        /// 不分片 (Don't Fragment)
        const DF = 0x4000;
        /// 更多分片 (More Fragments)
        const MF = 0x2000;
    }
}

/// IPv4 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpHdr {
    /// 头部长度 (以 4 字节为单位)
    pub ihl: u8,
    /// 服务类型
    pub tos: u8,
    /// 总长度
    pub tot_len: u16,
    /// 标识
    pub id: u16,
    /// 分片标志
    pub flags: IpFlags,
    /// 分片偏移 (以 8 字节为单位)
    pub frag_off: u16,
    /// TTL
    pub ttl: u8,
    /// 协议
    pub protocol: u8,
    /// 头部校验和
    pub check: u16,
    /// 源 IP 地址
    pub saddr: Ipv4Addr,
    /// 目标 IP 地址
    pub daddr: Ipv4Addr,
}

impl IpHdr {
    /// 解析 IPv4 头部
    ///
    /// # 说明
    /// 检查长度、版本号和头部长度字段，不检查校验和
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < IPHDR_LEN {
            return Err(NetError::Malformed);
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != IP_VERSION || ihl < 5 || data.len() < ihl as usize * 4 {
            return Err(NetError::Malformed);
        }

        let frag = u16::from_be_bytes([data[6], data[7]]);

        Ok(Self {
            ihl,
            tos: data[1],
            tot_len: u16::from_be_bytes([data[2], data[3]]),
            id: u16::from_be_bytes([data[4], data[5]]),
            flags: IpFlags::from_bits_truncate(frag),
            frag_off: frag & IP_OFFSET_MASK,
            ttl: data[8],
            protocol: data[9],
            check: u16::from_be_bytes([data[10], data[11]]),
            saddr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            daddr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        })
    }

    /// 头部长度 (字节)
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// 是否为分片 (MF 置位或偏移非零)
    pub fn is_fragment(&self) -> bool {
        self.flags.contains(IpFlags::MF) || self.frag_off != 0
    }

    /// 写入 `dst` 的前 `IPHDR_LEN` 字节 (不含选项)
    pub fn write(&self, dst: &mut [u8]) {
        dst[0] = (IP_VERSION << 4) | 5;
        dst[1] = self.tos;
        dst[2..4].copy_from_slice(&self.tot_len.to_be_bytes());
        dst[4..6].copy_from_slice(&self.id.to_be_bytes());
        let frag = self.flags.bits() | (self.frag_off & IP_OFFSET_MASK);
        dst[6..8].copy_from_slice(&frag.to_be_bytes());
        dst[8] = self.ttl;
        dst[9] = self.protocol;
        dst[10..12].copy_from_slice(&self.check.to_be_bytes());
        dst[12..16].copy_from_slice(&self.saddr.octets());
        dst[16..20].copy_from_slice(&self.daddr.octets());
    }
}

/// 接收 IPv4 数据报
///
/// # 处理顺序
/// 1. 长度、版本号、头部长度检查
/// 2. 头部校验和
/// 3. 目标地址不是本机则静默丢弃
/// 4. 总长度检查并去掉尾部填充
/// 5. TTL：递减后为 0 则回复 ICMP 超时并停止
/// 6. 分片直接丢弃 (不支持重组)
/// 7. 按协议号分发，没有处理函数时回复 ICMP 协议不可达
pub fn ip_in(stack: &mut NetStack, mut buf: PacketBuf, src_mac: MacAddr) {
    let hdr = match IpHdr::parse(buf.as_slice()) {
        Ok(hdr) => hdr,
        Err(_) => {
            debug!("ipv4: bad header from {}, dropped", MacDisplay(&src_mac));
            stack.stats.rx_dropped += 1;
            return;
        }
    };
    let hlen = hdr.header_len();

    if !verify_ip_checksum(&buf.as_slice()[..hlen]) {
        debug!("ipv4: bad checksum from {}, dropped", hdr.saddr);
        stack.stats.rx_dropped += 1;
        return;
    }

    if hdr.daddr != stack.config.ip {
        trace!("ipv4: {} is not for us", hdr.daddr);
        return;
    }

    let tot_len = hdr.tot_len as usize;
    if tot_len < hlen || tot_len > buf.len() {
        debug!(
            "ipv4: bad total length {} (received {}), dropped",
            tot_len,
            buf.len()
        );
        stack.stats.rx_dropped += 1;
        return;
    }
    if buf.truncate(tot_len).is_err() {
        stack.stats.rx_dropped += 1;
        return;
    }

    if hdr.ttl <= 1 {
        debug!("ipv4: ttl expired from {}", hdr.saddr);
        icmp_time_exceeded(stack, &buf, hdr.saddr);
        return;
    }

    if hdr.is_fragment() {
        debug!(
            "ipv4: fragment id {} offset {} from {}, no reassembly, dropped",
            hdr.id,
            hdr.frag_off,
            hdr.saddr
        );
        stack.stats.rx_dropped += 1;
        return;
    }

    trace!(
        "ipv4: rx {} -> {} proto {} len {}",
        hdr.saddr,
        hdr.daddr,
        hdr.protocol,
        tot_len
    );

    buf.set_network_header();
    if buf.pop_header(hlen).is_err() {
        stack.stats.rx_dropped += 1;
        return;
    }

    match stack.ip_protocols.lookup(hdr.protocol as u16) {
        Some(handler) => handler(stack, buf, hdr.saddr),
        None => {
            debug!("ipv4: protocol {} unreachable", hdr.protocol);
            if buf.push_network_header().is_ok() {
                icmp_dest_unreachable(stack, &buf, hdr.saddr, ICMP_PROT_UNREACH);
            }
        }
    }
}

/// 发送 IPv4 数据报
///
/// # 参数
/// - `buf`: 上层数据 (不含 IP 头部)
/// - `dst`: 目标 IP 地址
/// - `protocol`: 上层协议号
///
/// # 说明
/// 负载不超过 `mtu - 20` 时发送单个数据报；否则按 8 字节对齐的块分片，
/// 所有分片共享同一个标识，除最后一片外都设置 MF。
/// 负载超过 65515 字节时返回 `InvalidArgument`，不发送任何分片。
pub fn ip_out(
    stack: &mut NetStack,
    buf: PacketBuf,
    dst: Ipv4Addr,
    protocol: u8,
) -> Result<(), NetError> {
    if buf.len() > IP_MAX_PAYLOAD {
        warn!(
            "ipv4: {} byte payload to {} exceeds {}, not sent",
            buf.len(),
            dst,
            IP_MAX_PAYLOAD
        );
        return Err(NetError::InvalidArgument);
    }

    let max_payload = stack.config.mtu - IPHDR_LEN;
    let id = stack.next_ip_id();

    if buf.len() <= max_payload {
        return ip_fragment_out(stack, buf, dst, protocol, id, 0, false);
    }

    let chunk = max_payload / 8 * 8;
    let data = buf.as_slice();
    let total = data.len();
    trace!(
        "ipv4: fragmenting {} bytes to {} in chunks of {}",
        total,
        dst,
        chunk
    );

    let mut offset = 0;
    while offset < total {
        let end = core::cmp::min(offset + chunk, total);
        let frag = PacketBuf::from_slice(&data[offset..end]);
        let frag_off = u16::try_from(offset / 8).map_err(|_| NetError::InvalidArgument)?;
        ip_fragment_out(stack, frag, dst, protocol, id, frag_off, end < total)?;
        offset = end;
    }

    Ok(())
}

/// 为单个分片添加 IP 头部并发送
///
/// # 参数
/// - `frag_off`: 分片偏移 (以 8 字节为单位)
/// - `more`: 是否设置 MF
///
/// # 说明
/// 目标为 255.255.255.255 时直接发往广播 MAC 地址，否则交给 ARP 解析
pub fn ip_fragment_out(
    stack: &mut NetStack,
    mut buf: PacketBuf,
    dst: Ipv4Addr,
    protocol: u8,
    id: u16,
    frag_off: u16,
    more: bool,
) -> Result<(), NetError> {
    let tot_len =
        u16::try_from(buf.len() + IPHDR_LEN).map_err(|_| NetError::InvalidArgument)?;

    let mut flags = IpFlags::empty();
    if more {
        flags |= IpFlags::MF;
    }

    let hdr = IpHdr {
        ihl: 5,
        tos: 0,
        tot_len,
        id,
        flags,
        frag_off,
        ttl: stack.config.default_ttl,
        protocol,
        check: 0,
        saddr: stack.config.ip,
        daddr: dst,
    };

    let raw = match buf.push_header(IPHDR_LEN) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("ipv4: no headroom for header to {}: {}", dst, err);
            stack.stats.tx_dropped += 1;
            return Err(err);
        }
    };
    hdr.write(raw);
    let check = ip_checksum(&raw[..IPHDR_LEN]);
    raw[10..12].copy_from_slice(&check.to_be_bytes());

    trace!(
        "ipv4: tx {} proto {} id {} off {} mf {} len {}",
        dst,
        protocol,
        id,
        frag_off,
        more,
        tot_len
    );

    if dst == Ipv4Addr::BROADCAST {
        return ethernet_out(stack, buf, ETH_BROADCAST, EthProtocol::ETH_P_IP.to_u16());
    }
    arp_resolve_and_send(stack, buf, dst)
}
