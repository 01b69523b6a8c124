//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IP 校验和计算
//!
//! 完全遵循 RFC 1071 - Computing the Internet Checksum

use core::net::Ipv4Addr;

/// 伪头部长度 (源 IP + 目标 IP + 保留 + 协议 + 长度)
pub const PSEUDO_HDR_LEN: usize = 12;

/// 计算 IP 校验和
///
/// # 参数
/// - `data`: 数据，奇数长度时按末尾补一个零字节计算（不修改数据）
///
/// # 返回
/// 校验和，按大端序写入报文
///
/// # 说明
/// RFC 1071 定义的 Internet 校验和算法：16 位反码求和，折叠进位后取反
pub fn ip_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }

    // 处理最后一个字节 (如果长度为奇数)
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }

    // 处理进位
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// 验证 IP 校验和
///
/// 包含校验和字段在内重新计算，结果为 0 即有效
pub fn verify_ip_checksum(data: &[u8]) -> bool {
    ip_checksum(data) == 0
}

/// 填写 TCP/UDP 伪头部
///
/// # 参数
/// - `dst`: 至少 `PSEUDO_HDR_LEN` 字节
/// - `src_addr`: 源 IP 地址
/// - `dst_addr`: 目标 IP 地址
/// - `protocol`: 协议号
/// - `len`: TCP/UDP 头部加数据的长度
pub fn write_pseudo_header(
    dst: &mut [u8],
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    protocol: u8,
    len: u16,
) {
    dst[0..4].copy_from_slice(&src_addr.octets());
    dst[4..8].copy_from_slice(&dst_addr.octets());
    dst[8] = 0;
    dst[9] = protocol;
    dst[10..12].copy_from_slice(&len.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_checksum() {
        // 校验和字段 (0xb1e6) 清零后的 IP 头部
        let mut data = [
            0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00, 0xac, 0x10,
            0x0a, 0x63, 0xac, 0x10, 0x0a, 0x0c,
        ];

        let csum = ip_checksum(&data);
        assert_eq!(csum, 0xb1e6);

        // 填回校验和后重新计算为 0
        data[10..12].copy_from_slice(&csum.to_be_bytes());
        assert!(verify_ip_checksum(&data));
    }

    #[test]
    fn test_odd_length() {
        // 奇数长度等价于补零
        assert_eq!(ip_checksum(&[0x12, 0x34, 0x56]), ip_checksum(&[0x12, 0x34, 0x56, 0x00]));
    }

    #[test]
    fn test_empty() {
        assert_eq!(ip_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_pseudo_header() {
        let mut hdr = [0u8; PSEUDO_HDR_LEN];
        write_pseudo_header(
            &mut hdr,
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 2),
            17,
            20,
        );
        assert_eq!(hdr, [192, 168, 1, 1, 192, 168, 1, 2, 0, 17, 0, 20]);
    }
}
