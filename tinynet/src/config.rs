//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络配置
//!
//! 编译期常量由 build.rs 根据 Net.toml 生成，
//! [`NetConfig`] 是运行时使用的配置，默认值取自这些常量。

use core::net::Ipv4Addr;

use crate::errno::NetError;
use crate::net::ethernet::MacAddr;
use crate::net::ipv4::{IP_MAX_MTU, IP_MIN_MTU};

include!(concat!(env!("OUT_DIR"), "/config.rs"));

/// 协议栈运行时配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// 本机 IP 地址
    pub ip: Ipv4Addr,
    /// 本机 MAC 地址
    pub mac: MacAddr,
    /// 链路 MTU
    pub mtu: usize,
    /// ARP 表项超时 (毫秒)
    pub arp_timeout_ms: u64,
    /// 同一目标 ARP 请求最小间隔 (毫秒)
    pub arp_min_interval_ms: u64,
    /// ARP 表容量
    pub arp_cache_size: usize,
    /// 发送时使用的 TTL
    pub default_ttl: u8,
    /// UDP 端口表容量
    pub udp_table_size: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::from(NET_IF_IP),
            mac: NET_IF_MAC,
            mtu: ETH_MTU,
            arp_timeout_ms: ARP_TIMEOUT_SEC * 1000,
            arp_min_interval_ms: ARP_MIN_INTERVAL_SEC * 1000,
            arp_cache_size: ARP_CACHE_SIZE,
            default_ttl: IP_DEFAULT_TTL,
            udp_table_size: UDP_TABLE_SIZE,
        }
    }
}

impl NetConfig {
    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), NetError> {
        if self.mtu < IP_MIN_MTU as usize || self.mtu > IP_MAX_MTU as usize {
            return Err(NetError::InvalidArgument);
        }
        if self.arp_cache_size == 0 || self.udp_table_size == 0 {
            return Err(NetError::InvalidArgument);
        }
        if self.default_ttl == 0 {
            return Err(NetError::InvalidArgument);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.arp_timeout_ms, ARP_TIMEOUT_SEC * 1000);
    }

    #[test]
    fn test_reject_small_mtu() {
        let config = NetConfig {
            mtu: 40,
            ..NetConfig::default()
        };
        assert_eq!(config.validate(), Err(NetError::InvalidArgument));
    }
}
