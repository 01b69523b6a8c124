//! tinynet 构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析工作区根目录的 Net.toml 配置文件
//! 2. 在 OUT_DIR 中生成 config.rs

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetToml {
    interface: InterfaceSection,
    arp: ArpSection,
    ip: IpSection,
    udp: UdpSection,
    buffer: BufferSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct InterfaceSection {
    ip: String,
    mac: String,
    mtu: u32,
}

impl Default for InterfaceSection {
    fn default() -> Self {
        Self {
            ip: "192.168.163.103".to_string(),
            mac: "11:22:33:44:55:66".to_string(),
            mtu: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ArpSection {
    timeout_sec: u64,
    min_interval_sec: u64,
    cache_size: u32,
}

impl Default for ArpSection {
    fn default() -> Self {
        Self {
            timeout_sec: 300,
            min_interval_sec: 1,
            cache_size: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct IpSection {
    default_ttl: u8,
}

impl Default for IpSection {
    fn default() -> Self {
        Self { default_ttl: 64 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct UdpSection {
    table_size: u32,
}

impl Default for UdpSection {
    fn default() -> Self {
        Self { table_size: 64 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BufferSection {
    headroom: u32,
    tailroom: u32,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            headroom: 128,
            tailroom: 64,
        }
    }
}

/// 解析点分十进制 IPv4 地址
fn parse_ip(s: &str) -> [u8; 4] {
    let octets: Vec<u8> = s
        .trim()
        .split('.')
        .map(|part| part.parse::<u8>().expect("Net.toml: interface.ip 格式错误"))
        .collect();
    octets
        .try_into()
        .expect("Net.toml: interface.ip 必须包含 4 个字节")
}

/// 解析冒号分隔的 MAC 地址
fn parse_mac(s: &str) -> [u8; 6] {
    let bytes: Vec<u8> = s
        .trim()
        .split(':')
        .map(|part| u8::from_str_radix(part, 16).expect("Net.toml: interface.mac 格式错误"))
        .collect();
    bytes
        .try_into()
        .expect("Net.toml: interface.mac 必须包含 6 个字节")
}

fn main() {
    println!("cargo:rerun-if-changed=../Net.toml");
    println!("cargo:rerun-if-changed=build.rs");

    // 配置文件缺失时使用内置默认值
    let config: NetToml = match fs::read_to_string("../Net.toml") {
        Ok(content) => toml::from_str(&content).expect("Net.toml 解析失败"),
        Err(_) => {
            println!("cargo:warning=Net.toml not found, using built-in defaults");
            NetToml::default()
        }
    };

    let ip = parse_ip(&config.interface.ip);
    let mac = parse_mac(&config.interface.mac);

    if config.interface.mtu < 68 {
        panic!("Net.toml: interface.mtu 不能小于 68");
    }

    let generated = format!(
        r#"// tinynet 网络配置（自动生成）
//
// 此文件由 build.rs 根据 Net.toml 自动生成，请勿手动修改

/// 本机 IP 地址
pub const NET_IF_IP: [u8; 4] = {:?};

/// 本机 MAC 地址
pub const NET_IF_MAC: [u8; 6] = {:?};

/// 以太网 MTU
pub const ETH_MTU: usize = {};

/// ARP 表项超时 (秒)
pub const ARP_TIMEOUT_SEC: u64 = {};

/// ARP 请求最小间隔 (秒)
pub const ARP_MIN_INTERVAL_SEC: u64 = {};

/// ARP 缓存大小
pub const ARP_CACHE_SIZE: usize = {};

/// IPv4 默认 TTL
pub const IP_DEFAULT_TTL: u8 = {};

/// UDP 端口表大小
pub const UDP_TABLE_SIZE: usize = {};

/// 缓冲区头部预留空间
pub const NET_BUF_HEADROOM: usize = {};

/// 缓冲区尾部预留空间
pub const NET_BUF_TAILROOM: usize = {};
"#,
        ip,
        mac,
        config.interface.mtu,
        config.arp.timeout_sec,
        config.arp.min_interval_sec,
        config.arp.cache_size,
        config.ip.default_ttl,
        config.udp.table_size,
        config.buffer.headroom,
        config.buffer.tailroom,
    );

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR 未设置"));
    fs::write(out_dir.join("config.rs"), generated).expect("无法写入 config.rs");
}
