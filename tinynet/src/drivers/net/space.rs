//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络设备接口
//!
//! 协议栈只通过这里的发送/接收原语访问网卡。

use crate::errno::NetError;

/// 网络设备统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    /// 接收包数
    pub rx_packets: u64,
    /// 发送包数
    pub tx_packets: u64,
    /// 接收字节数
    pub rx_bytes: u64,
    /// 发送字节数
    pub tx_bytes: u64,
    /// 发送错误数
    pub tx_errors: u64,
    /// 接收丢弃数
    pub rx_dropped: u64,
}

/// 网络设备
///
/// # 说明
/// - `xmit` 发送一个完整的以太网帧（不含 FCS）
/// - `recv` 非阻塞地接收一帧到 `buf`，没有数据时返回 None
pub trait NetDevice: Send {
    /// 设备名 (例如 "lo", "eth0")
    fn name(&self) -> &str;

    /// 发送数据帧
    fn xmit(&mut self, frame: &[u8]) -> Result<(), NetError>;

    /// 接收数据帧
    ///
    /// # 返回
    /// 写入 `buf` 的字节数
    fn recv(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// 获取统计信息
    fn stats(&self) -> DeviceStats {
        DeviceStats::default()
    }
}
