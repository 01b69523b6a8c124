//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 以太网层
//!
//! 无状态的逐帧处理：接收时剥离以太网头部并按协议类型分发，
//! 发送时补齐最小帧长、压入头部后交给网卡。

use core::fmt;

use log::{debug, trace, warn};

use crate::errno::NetError;
use crate::net::buffer::PacketBuf;
use crate::net::stack::NetStack;

/// 以太网头部长度
pub const ETH_HLEN: usize = 14;

/// 以太网最小帧长度 (不含 FCS)
pub const ETH_ZLEN: usize = 60;

/// 以太网最小负载长度
pub const ETH_MIN_PAYLOAD: usize = ETH_ZLEN - ETH_HLEN;

/// 以太网地址长度 (MAC 地址)
pub const ETH_ALEN: usize = 6;

/// MAC 地址
pub type MacAddr = [u8; ETH_ALEN];

/// 广播 MAC 地址
pub const ETH_BROADCAST: MacAddr = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// 以太网帧头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHdr {
    /// 目标 MAC 地址
    pub h_dest: MacAddr,
    /// 源 MAC 地址
    pub h_source: MacAddr,
    /// 协议类型 (ETH_P_IP, ETH_P_ARP, etc.)
    pub h_proto: u16,
}

impl EthHdr {
    /// 从字节切片解析以太网头部
    pub fn parse(data: &[u8]) -> Result<Self, NetError> {
        if data.len() < ETH_HLEN {
            return Err(NetError::Malformed);
        }

        let mut h_dest = [0u8; ETH_ALEN];
        let mut h_source = [0u8; ETH_ALEN];
        h_dest.copy_from_slice(&data[0..6]);
        h_source.copy_from_slice(&data[6..12]);

        Ok(Self {
            h_dest,
            h_source,
            h_proto: u16::from_be_bytes([data[12], data[13]]),
        })
    }

    /// 按网络字节序写入 `dst` 的前 `ETH_HLEN` 字节
    pub fn write(&self, dst: &mut [u8]) {
        dst[0..6].copy_from_slice(&self.h_dest);
        dst[6..12].copy_from_slice(&self.h_source);
        dst[12..14].copy_from_slice(&self.h_proto.to_be_bytes());
    }
}

/// MAC 地址的显示格式 (例如 "52:54:00:12:34:56")
pub struct MacDisplay<'a>(pub &'a MacAddr);

impl fmt::Display for MacDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

/// 接收以太网帧
///
/// # 参数
/// - `buf`: 包含完整以太网帧的缓冲区
///
/// # 说明
/// 短于以太网头部的帧被记录并丢弃；否则剥离头部，
/// 以源 MAC 地址作为来源交给协议分发表。
pub fn ethernet_in(stack: &mut NetStack, mut buf: PacketBuf) {
    stack.stats.rx_frames += 1;

    let hdr = match EthHdr::parse(buf.as_slice()) {
        Ok(hdr) => hdr,
        Err(_) => {
            debug!("ethernet: frame too short ({} bytes), dropped", buf.len());
            stack.stats.rx_dropped += 1;
            return;
        }
    };

    trace!(
        "ethernet: rx {} -> {} proto {:#06x} len {}",
        MacDisplay(&hdr.h_source),
        MacDisplay(&hdr.h_dest),
        hdr.h_proto,
        buf.len()
    );

    if buf.pop_header(ETH_HLEN).is_err() {
        stack.stats.rx_dropped += 1;
        return;
    }

    stack.net_in(buf, hdr.h_proto, hdr.h_source);
}

/// 发送以太网帧
///
/// # 参数
/// - `buf`: 上层数据
/// - `dest`: 目标 MAC 地址
/// - `proto`: 协议类型
///
/// # 说明
/// - 负载不足 46 字节时在尾部补零
/// - 压入头部（目标地址、本机地址、协议类型）后交给网卡
/// - 缓冲区无法增长或网卡发送失败时记录日志并放弃，不重试
pub fn ethernet_out(
    stack: &mut NetStack,
    mut buf: PacketBuf,
    dest: MacAddr,
    proto: u16,
) -> Result<(), NetError> {
    if buf.len() < ETH_MIN_PAYLOAD {
        let pad = ETH_MIN_PAYLOAD - buf.len();
        if let Err(err) = buf.add_trailer(pad) {
            warn!("ethernet: failed to pad frame: {}", err);
            stack.stats.tx_dropped += 1;
            return Err(err);
        }
    }

    let hdr = EthHdr {
        h_dest: dest,
        h_source: stack.config.mac,
        h_proto: proto,
    };
    match buf.push_header(ETH_HLEN) {
        Ok(dst) => hdr.write(dst),
        Err(err) => {
            warn!("ethernet: no headroom for header: {}", err);
            stack.stats.tx_dropped += 1;
            return Err(err);
        }
    }

    trace!(
        "ethernet: tx -> {} proto {:#06x} len {}",
        MacDisplay(&dest),
        proto,
        buf.len()
    );

    if let Err(err) = stack.device.xmit(buf.as_slice()) {
        warn!("ethernet: {} failed to send frame: {}", stack.device.name(), err);
        stack.stats.tx_dropped += 1;
        return Err(err);
    }

    stack.stats.tx_frames += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::buffer::EthProtocol;
    use crate::tests::{test_stack, PEER_MAC};

    #[test]
    fn test_eth_hdr_roundtrip_layout() {
        let hdr = EthHdr {
            h_dest: ETH_BROADCAST,
            h_source: [0x52, 0x54, 0x00, 0x12, 0x34, 0x56],
            h_proto: 0x0806,
        };
        let mut raw = [0u8; ETH_HLEN];
        hdr.write(&mut raw);
        assert_eq!(&raw[12..14], &[0x08, 0x06]);
        assert_eq!(EthHdr::parse(&raw), Ok(hdr));
    }

    #[test]
    fn test_mac_display() {
        let mac = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
        assert_eq!(alloc::format!("{}", MacDisplay(&mac)), "52:54:00:12:34:56");
    }

    #[test]
    fn test_ethernet_out_pads_short_frame() {
        let (mut stack, lo, _clock) = test_stack();

        let buf = PacketBuf::from_slice(b"hi");
        ethernet_out(&mut stack, buf, PEER_MAC, EthProtocol::ETH_P_IP.to_u16()).unwrap();

        let sent = lo.take_sent();
        assert_eq!(sent.len(), 1);
        let frame = &sent[0];
        assert_eq!(frame.len(), ETH_ZLEN);
        assert_eq!(&frame[0..6], &PEER_MAC);
        assert_eq!(&frame[6..12], &stack.config().mac);
        assert_eq!(&frame[12..14], &[0x08, 0x00]);
        assert_eq!(&frame[14..16], b"hi");
        assert!(frame[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_ethernet_out_device_failure() {
        let (mut stack, lo, _clock) = test_stack();
        lo.set_fail_tx(true);

        let buf = PacketBuf::alloc(64);
        assert_eq!(
            ethernet_out(&mut stack, buf, PEER_MAC, 0x0800),
            Err(NetError::DeviceError)
        );
        assert_eq!(stack.stats().tx_dropped, 1);
    }

    #[test]
    fn test_ethernet_out_no_tailroom() {
        let (mut stack, lo, _clock) = test_stack();

        let mut buf = PacketBuf::new(ETH_ZLEN);
        let payload = buf.add_trailer(ETH_ZLEN / 2).unwrap();
        payload.fill(1);
        // 负载 30 字节需要补齐，但尾部没有空间
        assert_eq!(
            ethernet_out(&mut stack, buf, PEER_MAC, 0x0800),
            Err(NetError::NoBufferSpace)
        );
        assert_eq!(lo.sent_len(), 0);
    }

    #[test]
    fn test_ethernet_in_short_frame_dropped() {
        let (mut stack, lo, _clock) = test_stack();
        let before = stack.stats().rx_dropped;

        ethernet_in(&mut stack, PacketBuf::from_slice(&[0u8; ETH_HLEN - 1]));

        assert_eq!(stack.stats().rx_dropped, before + 1);
        assert_eq!(lo.sent_len(), 0);
    }
}
