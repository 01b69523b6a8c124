//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 测试辅助模块
//!
//! 提供基于回环设备和手动时钟的协议栈，以及构造各层报文的函数。
//! 端到端测试在 `network` 子模块中。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::net::Ipv4Addr;

use crate::config::NetConfig;
use crate::drivers::net::{LoopbackDevice, LoopbackHandle};
use crate::drivers::timer::ManualClock;
use crate::net::arp::{arp_in, ArpOp, ArpPacket};
use crate::net::buffer::PacketBuf;
use crate::net::ethernet::{EthHdr, MacAddr, ETH_ALEN, ETH_HLEN};
use crate::net::icmp::{ICMP_ECHO, ICMP_HLEN};
use crate::net::ipv4::checksum::{ip_checksum, write_pseudo_header, PSEUDO_HDR_LEN};
use crate::net::ipv4::{IpFlags, IpHdr, IPHDR_LEN};
use crate::net::stack::NetStack;
use crate::net::udp::{UdpHdr, UDP_HLEN};


/// 对端 IP 地址
pub const PEER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 163, 1);

/// 对端 MAC 地址
pub const PEER_MAC: MacAddr = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// 使用默认配置创建协议栈，清空启动时发出的 ARP 请求
pub fn test_stack() -> (NetStack, LoopbackHandle, ManualClock) {
    test_stack_with(NetConfig::default())
}

/// 使用指定配置创建协议栈
pub fn test_stack_with(config: NetConfig) -> (NetStack, LoopbackHandle, ManualClock) {
    let (device, lo) = LoopbackDevice::create();
    let clock = ManualClock::new(0);
    let stack = NetStack::new(config, Box::new(device), Box::new(clock.clone())).unwrap();
    lo.take_sent();
    (stack, lo, clock)
}

/// 让协议栈学习到对端地址
pub fn resolve_peer(stack: &mut NetStack, lo: &LoopbackHandle) {
    let my_ip = stack.config().ip;
    let reply = arp_payload(ArpOp::ARPOP_REPLY, PEER_MAC, PEER_IP, my_ip);
    arp_in(stack, PacketBuf::from_slice(&reply), PEER_MAC);
    lo.take_sent();
}

/// 构造以太网帧
pub fn eth_frame(dest: MacAddr, source: MacAddr, proto: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = alloc::vec![0u8; ETH_HLEN];
    EthHdr {
        h_dest: dest,
        h_source: source,
        h_proto: proto,
    }
    .write(&mut frame);
    frame.extend_from_slice(payload);
    frame
}

/// 构造 ARP 报文 (不含以太网头部)
pub fn arp_payload(
    op: ArpOp,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let mut raw = alloc::vec![0u8; ArpPacket::LEN];
    ArpPacket {
        op,
        ar_sha: sender_mac,
        ar_sip: sender_ip,
        ar_tha: [0; ETH_ALEN],
        ar_tip: target_ip,
    }
    .write(&mut raw);
    raw
}

/// 构造带正确校验和的 IPv4 数据报
pub fn ipv4_packet(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
    ttl: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut packet = alloc::vec![0u8; IPHDR_LEN];
    IpHdr {
        ihl: 5,
        tos: 0,
        tot_len: (IPHDR_LEN + payload.len()) as u16,
        id: 0x4242,
        flags: IpFlags::DF,
        frag_off: 0,
        ttl,
        protocol,
        check: 0,
        saddr: src,
        daddr: dst,
    }
    .write(&mut packet);
    let check = ip_checksum(&packet);
    packet[10..12].copy_from_slice(&check.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// 构造 ICMP 回显请求
pub fn icmp_echo_request(id: u16, seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut msg = alloc::vec![0u8; ICMP_HLEN];
    msg[0] = ICMP_ECHO;
    msg[4..6].copy_from_slice(&id.to_be_bytes());
    msg[6..8].copy_from_slice(&seq.to_be_bytes());
    msg.extend_from_slice(payload);
    let check = ip_checksum(&msg);
    msg[2..4].copy_from_slice(&check.to_be_bytes());
    msg
}

/// 构造带正确校验和的 UDP 数据报 (不含 IP 头部)
pub fn udp_datagram(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let len = (UDP_HLEN + payload.len()) as u16;
    let mut dgram = alloc::vec![0u8; UDP_HLEN];
    UdpHdr {
        source: src_port,
        dest: dst_port,
        len,
        check: 0,
    }
    .write(&mut dgram);
    dgram.extend_from_slice(payload);

    let mut span = alloc::vec![0u8; PSEUDO_HDR_LEN];
    write_pseudo_header(&mut span, src_ip, dst_ip, 17, len);
    span.extend_from_slice(&dgram);
    let check = match ip_checksum(&span) {
        0 => 0xFFFF,
        check => check,
    };
    dgram[6..8].copy_from_slice(&check.to_be_bytes());
    dgram
}
