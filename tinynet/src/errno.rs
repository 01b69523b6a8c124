//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 协议栈错误代码
//!
//! 和 include/uapi/asm-generic/errno.h 的编号保持一致

use core::fmt;

/// 协议栈错误
///
/// 使用方法：
/// ```rust
/// use tinynet::errno::NetError;
///
/// // 返回错误（系统调用风格，返回负数）
/// let code = NetError::NoBufferSpace.as_neg_i32();
/// assert_eq!(code, -105);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NetError {
    /// 缓冲区头部或尾部空间不足 (ENOBUFS, 105)
    NoBufferSpace,

    /// 移除的长度超过当前数据长度 (EINVAL, 22)
    BufferUnderflow,

    /// 报文格式错误 (EBADMSG, 74)
    Malformed,

    /// 缓存已满 (ENOMEM, 12)
    CacheFull,

    /// 该目标已有等待 ARP 解析的报文 (EAGAIN, 11)
    PendingBusy,

    /// 网卡发送失败 (EIO, 5)
    DeviceError,

    /// 参数非法 (EINVAL, 22)
    InvalidArgument,
}

impl NetError {
    /// 获取 errno 编号
    pub const fn as_i32(self) -> i32 {
        match self {
            NetError::NoBufferSpace => 105,
            NetError::BufferUnderflow => 22,
            NetError::Malformed => 74,
            NetError::CacheFull => 12,
            NetError::PendingBusy => 11,
            NetError::DeviceError => 5,
            NetError::InvalidArgument => 22,
        }
    }

    /// 获取负数 errno（系统调用返回值风格）
    pub const fn as_neg_i32(self) -> i32 {
        -self.as_i32()
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NetError::NoBufferSpace => "no buffer space",
            NetError::BufferUnderflow => "buffer underflow",
            NetError::Malformed => "malformed packet",
            NetError::CacheFull => "cache full",
            NetError::PendingBusy => "address resolution pending",
            NetError::DeviceError => "device error",
            NetError::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(NetError::NoBufferSpace.as_i32(), 105);
        assert_eq!(NetError::CacheFull.as_neg_i32(), -12);
        assert_eq!(NetError::DeviceError.as_i32(), 5);
    }

    #[test]
    fn test_errno_display() {
        assert_eq!(alloc::format!("{}", NetError::Malformed), "malformed packet");
    }
}
