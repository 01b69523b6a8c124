//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议分发表
//!
//! 以协议号为键登记接收处理函数。以太网层按 EtherType 分发，
//! IP 层按 IP 协议号分发，两者各用一张表。

use alloc::collections::BTreeMap;

/// 协议分发表
///
/// 每个协议号只对应一个处理函数，重复登记时后者覆盖前者。
pub struct ProtocolTable<H> {
    handlers: BTreeMap<u16, H>,
}

impl<H: Copy> ProtocolTable<H> {
    /// 创建空表
    pub const fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// 登记处理函数
    ///
    /// # 返回
    /// 被覆盖的旧处理函数
    pub fn register(&mut self, protocol: u16, handler: H) -> Option<H> {
        self.handlers.insert(protocol, handler)
    }

    /// 查找处理函数
    ///
    /// 返回的是副本，调用方可以在持有 `&mut` 协议栈时调用它
    pub fn lookup(&self, protocol: u16) -> Option<H> {
        self.handlers.get(&protocol).copied()
    }
}

impl<H: Copy> Default for ProtocolTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
