//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 时钟接口
//!
//! 缓存老化只需要一个单调递增的毫秒时间。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// 毫秒时钟
pub trait Clock: Send + Sync {
    /// 当前时间 (毫秒)，必须单调不减
    fn now_ms(&self) -> u64;
}

/// 手动推进的时钟
///
/// 克隆出的句柄共享同一个时间，测试或外部轮询循环可以用它推进时间。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// 创建时钟，初始时间为 `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// 时间前进 `ms` 毫秒
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    /// 设置当前时间（不能倒退）
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(10);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now_ms(), 15);

        // 不能倒退
        handle.set(3);
        assert_eq!(clock.now_ms(), 15);
        handle.set(20);
        assert_eq!(clock.now_ms(), 20);
    }
}
