//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 回环网络设备
//!
//! 发送的帧进入发送队列，接收的帧取自接收队列。两个队列通过
//! [`LoopbackHandle`] 与外部共享：外部可以注入收到的帧、取走发出的帧。
//! 打开回显模式后，发出的帧会同时放回接收队列。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::drivers::net::space::{DeviceStats, NetDevice};
use crate::errno::NetError;

#[derive(Default)]
struct LoopbackQueues {
    rx: VecDeque<Vec<u8>>,
    tx: VecDeque<Vec<u8>>,
    stats: DeviceStats,
    echo: bool,
    fail_tx: bool,
}

/// 回环设备
pub struct LoopbackDevice {
    name: &'static str,
    queues: Arc<Mutex<LoopbackQueues>>,
}

/// 回环设备队列句柄
#[derive(Clone)]
pub struct LoopbackHandle {
    queues: Arc<Mutex<LoopbackQueues>>,
}

impl LoopbackDevice {
    /// 创建回环设备及其队列句柄
    pub fn create() -> (Self, LoopbackHandle) {
        let queues = Arc::new(Mutex::new(LoopbackQueues::default()));
        let device = Self {
            name: "lo",
            queues: queues.clone(),
        };
        (device, LoopbackHandle { queues })
    }
}

impl NetDevice for LoopbackDevice {
    fn name(&self) -> &str {
        self.name
    }

    fn xmit(&mut self, frame: &[u8]) -> Result<(), NetError> {
        let mut queues = self.queues.lock();
        if queues.fail_tx {
            queues.stats.tx_errors += 1;
            return Err(NetError::DeviceError);
        }

        queues.stats.tx_packets += 1;
        queues.stats.tx_bytes += frame.len() as u64;
        if queues.echo {
            queues.rx.push_back(frame.to_vec());
        }
        queues.tx.push_back(frame.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        let mut queues = self.queues.lock();
        let frame = queues.rx.pop_front()?;

        // 超过接收缓冲区的帧直接丢弃
        if frame.len() > buf.len() {
            queues.stats.rx_dropped += 1;
            return None;
        }

        buf[..frame.len()].copy_from_slice(&frame);
        queues.stats.rx_packets += 1;
        queues.stats.rx_bytes += frame.len() as u64;
        Some(frame.len())
    }

    fn stats(&self) -> DeviceStats {
        self.queues.lock().stats
    }
}

impl LoopbackHandle {
    /// 注入一个待接收的帧
    pub fn inject(&self, frame: &[u8]) {
        self.queues.lock().rx.push_back(frame.to_vec());
    }

    /// 取走所有已发送的帧
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        self.queues.lock().tx.drain(..).collect()
    }

    /// 已发送但尚未取走的帧数
    pub fn sent_len(&self) -> usize {
        self.queues.lock().tx.len()
    }

    /// 打开或关闭回显模式
    pub fn set_echo(&self, echo: bool) {
        self.queues.lock().echo = echo;
    }

    /// 让后续发送失败（用于模拟网卡故障）
    pub fn set_fail_tx(&self, fail: bool) {
        self.queues.lock().fail_tx = fail;
    }

    /// 获取统计信息
    pub fn stats(&self) -> DeviceStats {
        self.queues.lock().stats
    }
}
