//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议栈上下文
//!
//! [`NetStack`] 持有协议栈的全部状态，各层处理函数都以 `&mut NetStack`
//! 为第一个参数。协议栈是单线程、轮询驱动的：[`NetStack::poll`] 每次从
//! 网卡取一帧，同步地走完整个接收路径后返回。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::net::Ipv4Addr;

use log::{info, trace, warn};

use crate::config::NetConfig;
use crate::drivers::net::{DeviceStats, NetDevice};
use crate::drivers::timer::Clock;
use crate::errno::NetError;
use crate::net::arp::{self, arp_in};
use crate::net::buffer::{EthProtocol, IpProtocol, PacketBuf};
use crate::net::cache::{AgingCache, CachePolicy};
use crate::net::ethernet::{ethernet_in, MacAddr, MacDisplay, ETH_HLEN};
use crate::net::icmp::icmp_in;
use crate::net::ipv4::{self, ip_in};
use crate::net::protocol::ProtocolTable;
use crate::net::udp::{self, udp_in, UdpDatagram, UdpHandler, UdpPort};

/// 链路层协议处理函数 (参数为去掉以太网头部的数据和源 MAC 地址)
pub type LinkHandler = fn(&mut NetStack, PacketBuf, MacAddr);

/// 网络层协议处理函数 (参数为去掉 IP 头部的数据和源 IP 地址)
pub type IpHandler = fn(&mut NetStack, PacketBuf, Ipv4Addr);

/// 协议栈计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetStats {
    /// 收到的帧
    pub rx_frames: u64,
    /// 成功发出的帧
    pub tx_frames: u64,
    /// 因格式错误或无处理函数丢弃的接收报文
    pub rx_dropped: u64,
    /// 因缓冲区或网卡错误放弃的发送
    pub tx_dropped: u64,
    /// 发出的 ICMP 差错报文
    pub icmp_errors_sent: u64,
    /// 因 ARP 等待位置被占用而丢弃的数据报
    pub arp_pending_dropped: u64,
}

/// 协议栈
pub struct NetStack {
    pub(crate) config: NetConfig,
    pub(crate) device: Box<dyn NetDevice>,
    clock: Box<dyn Clock>,
    pub(crate) link_protocols: ProtocolTable<LinkHandler>,
    pub(crate) ip_protocols: ProtocolTable<IpHandler>,
    /// IP -> MAC
    pub(crate) arp_table: AgingCache<Ipv4Addr, MacAddr>,
    /// 等待地址解析的数据报，每个目标一个
    pub(crate) arp_pending: AgingCache<Ipv4Addr, PacketBuf>,
    pub(crate) udp_table: AgingCache<UdpPort, UdpHandler>,
    ip_id: u16,
    pub(crate) stats: NetStats,
}

impl NetStack {
    /// 创建协议栈
    ///
    /// # 说明
    /// - 检查配置
    /// - 登记 ARP、IPv4、ICMP、UDP 处理函数
    /// - 广播一个询问本机地址的 ARP 请求
    pub fn new(
        config: NetConfig,
        device: Box<dyn NetDevice>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, NetError> {
        config.validate()?;

        let mut stack = Self {
            arp_table: AgingCache::new(
                config.arp_timeout_ms,
                config.arp_cache_size,
                CachePolicy::Share,
            ),
            arp_pending: AgingCache::new(
                config.arp_min_interval_ms,
                config.arp_cache_size,
                CachePolicy::DeepCopy(PacketBuf::detach),
            ),
            udp_table: AgingCache::new(0, config.udp_table_size, CachePolicy::Share),
            link_protocols: ProtocolTable::new(),
            ip_protocols: ProtocolTable::new(),
            ip_id: 0,
            stats: NetStats::default(),
            config,
            device,
            clock,
        };

        stack.register_link_protocol(EthProtocol::ETH_P_ARP.to_u16(), arp_in);
        stack.register_link_protocol(EthProtocol::ETH_P_IP.to_u16(), ip_in);
        stack.register_ip_protocol(IpProtocol::IPPROTO_ICMP.to_u8(), icmp_in);
        stack.register_ip_protocol(IpProtocol::IPPROTO_UDP.to_u8(), udp_in);

        info!(
            "net: {} up, ip {} mac {} mtu {}",
            stack.device.name(),
            stack.config.ip,
            MacDisplay(&stack.config.mac),
            stack.config.mtu
        );

        let local_ip = stack.config.ip;
        if let Err(err) = arp::arp_request(&mut stack, local_ip) {
            warn!("net: failed to announce {}: {}", local_ip, err);
        }

        Ok(stack)
    }

    /// 当前配置
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// 计数器快照
    pub fn stats(&self) -> NetStats {
        self.stats
    }

    /// 网卡统计信息
    pub fn device_stats(&self) -> DeviceStats {
        self.device.stats()
    }

    /// 当前时间 (毫秒)
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// 分配下一个 IP 数据报标识
    pub(crate) fn next_ip_id(&mut self) -> u16 {
        let id = self.ip_id;
        self.ip_id = self.ip_id.wrapping_add(1);
        id
    }

    /// 登记链路层协议处理函数 (按 EtherType)，后登记的覆盖先登记的
    pub fn register_link_protocol(&mut self, protocol: u16, handler: LinkHandler) {
        self.link_protocols.register(protocol, handler);
    }

    /// 登记网络层协议处理函数 (按 IP 协议号)，后登记的覆盖先登记的
    pub fn register_ip_protocol(&mut self, protocol: u8, handler: IpHandler) {
        self.ip_protocols.register(protocol as u16, handler);
    }

    /// 按链路层协议号分发
    ///
    /// # 参数
    /// - `buf`: 去掉以太网头部的数据
    /// - `protocol`: EtherType
    /// - `src`: 源 MAC 地址
    pub fn net_in(&mut self, buf: PacketBuf, protocol: u16, src: MacAddr) {
        match self.link_protocols.lookup(protocol) {
            Some(handler) => handler(self, buf, src),
            None => {
                trace!("net: no handler for ethertype {:#06x}, dropped", protocol);
                self.stats.rx_dropped += 1;
            }
        }
    }

    /// 处理一个收到的帧
    ///
    /// # 返回
    /// 网卡有帧可读时返回 true
    pub fn poll(&mut self) -> bool {
        let mut buf = PacketBuf::alloc(self.config.mtu + ETH_HLEN);
        let len = match self.device.recv(buf.as_mut_slice()) {
            Some(len) => len,
            None => return false,
        };
        if buf.truncate(len).is_err() {
            warn!("net: {} reported {} bytes, dropped", self.device.name(), len);
            self.stats.rx_dropped += 1;
            return true;
        }

        ethernet_in(self, buf);
        true
    }

    /// 发送 IP 数据报，必要时分片
    pub fn ip_out(&mut self, buf: PacketBuf, dst: Ipv4Addr, protocol: u8) -> Result<(), NetError> {
        ipv4::ip_out(self, buf, dst, protocol)
    }

    /// 打开 UDP 端口
    pub fn udp_open<F>(&mut self, port: UdpPort, handler: F) -> Result<(), NetError>
    where
        F: Fn(&mut NetStack, &UdpDatagram<'_>) + Send + Sync + 'static,
    {
        udp::udp_open(self, port, Arc::new(handler))
    }

    /// 关闭 UDP 端口
    pub fn udp_close(&mut self, port: UdpPort) {
        udp::udp_close(self, port);
    }

    /// 发送 UDP 数据报
    pub fn udp_send(
        &mut self,
        data: &[u8],
        src_port: UdpPort,
        dst_ip: Ipv4Addr,
        dst_port: UdpPort,
    ) -> Result<(), NetError> {
        udp::udp_send(self, data, src_port, dst_ip, dst_port)
    }

    /// 查询 ARP 表
    pub fn arp_lookup(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        let now = self.now_ms();
        self.arp_table.get(&ip, now).copied()
    }

    /// 列出未过期的 ARP 表项 (IP, MAC, 时间戳)，按插入顺序
    pub fn arp_entries(&self) -> Vec<(Ipv4Addr, MacAddr, u64)> {
        let mut entries = Vec::new();
        self.arp_table.for_each(self.now_ms(), |ip, mac, timestamp| {
            entries.push((*ip, *mac, timestamp));
        });
        entries
    }

    /// 打印 ARP 表
    pub fn arp_dump(&self) {
        let now = self.now_ms();
        info!("arp: {} entries", self.arp_entries().len());
        self.arp_table.for_each(now, |ip, mac, timestamp| {
            info!(
                "arp:   {:<15} {} age {} ms",
                ip,
                MacDisplay(mac),
                now.saturating_sub(timestamp)
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::LoopbackDevice;
    use crate::drivers::timer::ManualClock;
    use crate::net::arp::{ArpOp, ArpPacket};
    use crate::net::ethernet::ETH_BROADCAST;
    use crate::tests::{arp_payload, eth_frame, test_stack, PEER_IP, PEER_MAC};

    #[test]
    fn test_new_announces_local_ip() {
        let (device, lo) = LoopbackDevice::create();
        let stack = NetStack::new(
            NetConfig::default(),
            Box::new(device),
            Box::new(ManualClock::new(0)),
        )
        .unwrap();

        let sent = lo.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][0..6], &ETH_BROADCAST);
        let req = ArpPacket::parse(&sent[0][ETH_HLEN..]).unwrap();
        assert_eq!(req.op, ArpOp::ARPOP_REQUEST);
        assert_eq!(req.ar_tip, stack.config().ip);
        assert_eq!(stack.stats().tx_frames, 1);
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let (device, _lo) = LoopbackDevice::create();
        let config = NetConfig {
            mtu: 67,
            ..NetConfig::default()
        };
        let result = NetStack::new(config, Box::new(device), Box::new(ManualClock::new(0)));
        assert_eq!(result.err(), Some(NetError::InvalidArgument));
    }

    #[test]
    fn test_poll_runs_receive_path() {
        let (mut stack, lo, _clock) = test_stack();
        assert!(!stack.poll());

        let my_ip = stack.config().ip;
        let payload = arp_payload(ArpOp::ARPOP_REPLY, PEER_MAC, PEER_IP, my_ip);
        lo.inject(&eth_frame(stack.config().mac, PEER_MAC, 0x0806, &payload));

        assert!(stack.poll());
        assert!(!stack.poll());
        assert_eq!(stack.arp_lookup(PEER_IP), Some(PEER_MAC));
        assert_eq!(stack.stats().rx_frames, 1);
    }

    #[test]
    fn test_unknown_ethertype_dropped() {
        let (mut stack, lo, _clock) = test_stack();
        lo.inject(&eth_frame(stack.config().mac, PEER_MAC, 0x86DD, &[0u8; 40]));

        assert!(stack.poll());
        assert_eq!(stack.stats().rx_dropped, 1);
        assert_eq!(lo.sent_len(), 0);
    }

    fn count_frames(stack: &mut NetStack, _buf: PacketBuf, _src: MacAddr) {
        stack.stats.tx_frames += 100;
    }

    #[test]
    fn test_register_link_protocol_overrides() {
        let (mut stack, lo, _clock) = test_stack();
        stack.register_link_protocol(0x0806, count_frames);

        let before = stack.stats().tx_frames;
        lo.inject(&eth_frame(stack.config().mac, PEER_MAC, 0x0806, &[0u8; 46]));
        stack.poll();
        assert_eq!(stack.stats().tx_frames, before + 100);
    }

    #[test]
    fn test_arp_entries_in_insertion_order() {
        let (mut stack, _lo, clock) = test_stack();
        let my_ip = stack.config().ip;
        let other_ip = Ipv4Addr::new(192, 168, 163, 2);
        let other_mac = [0x02, 0, 0, 0, 0, 2];

        let reply = arp_payload(ArpOp::ARPOP_REPLY, PEER_MAC, PEER_IP, my_ip);
        arp_in(&mut stack, PacketBuf::from_slice(&reply), PEER_MAC);
        clock.advance(10);
        let reply = arp_payload(ArpOp::ARPOP_REPLY, other_mac, other_ip, my_ip);
        arp_in(&mut stack, PacketBuf::from_slice(&reply), other_mac);

        assert_eq!(
            stack.arp_entries(),
            alloc::vec![(PEER_IP, PEER_MAC, 0), (other_ip, other_mac, 10)]
        );
        stack.arp_dump();
    }
}
