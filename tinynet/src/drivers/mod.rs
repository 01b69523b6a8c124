//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议栈依赖的外部设备：网卡和时钟

pub mod net;
pub mod timer;
