//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络协议栈
//!
//! 分层结构：
//! - buffer: 网络缓冲区
//! - cache: 带老化的键值缓存
//! - protocol: 协议分发表
//! - ethernet: 以太网层
//! - arp: 地址解析
//! - ipv4: IPv4 层 (含校验和)
//! - icmp: ICMP 回显与差错报文
//! - udp: UDP 层
//! - stack: 协议栈上下文

pub mod arp;
pub mod buffer;
pub mod cache;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod protocol;
pub mod stack;
pub mod udp;
