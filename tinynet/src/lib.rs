//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! tinynet: 单网卡的以太网/ARP/IPv4/ICMP/UDP 协议栈
//!
//! 协议栈由一个 [`NetStack`](net::stack::NetStack) 上下文驱动，
//! 所有状态（ARP 表、待发送缓存、UDP 端口表）都保存在该对象中。
//! 网卡和时钟通过 [`NetDevice`](drivers::net::NetDevice) 与
//! [`Clock`](drivers::timer::Clock) 接入。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod errno;
pub mod net;

#[cfg(test)]
mod tests;

pub use config::NetConfig;
pub use errno::NetError;
pub use net::stack::{NetStack, NetStats};
