//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络缓冲区 (PacketBuf)
//!
//! 固定容量的字节区域加上一个可移动的 `(offset, len)` 窗口。
//! 各协议层在窗口头部压入/弹出协议头，在尾部追加/移除填充，
//! 不做任何隐式扩容。

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::config::{NET_BUF_HEADROOM, NET_BUF_TAILROOM};
use crate::errno::NetError;

/// 以太网协议类型
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum EthProtocol {
    /// IPv4
    ETH_P_IP = 0x0800,
    /// ARP
    ETH_P_ARP = 0x0806,
}

impl EthProtocol {
    /// 转换为 u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// IP 协议类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum IpProtocol {
    /// ICMP
    IPPROTO_ICMP = 1,
    /// UDP
    IPPROTO_UDP = 17,
}

impl IpProtocol {
    /// 转换为 u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// 网络缓冲区
///
/// # 内存布局
/// ```text
/// |<- headroom ->|<- 窗口 (实际数据) ->|<- tailroom ->|
/// 0            offset            offset+len       capacity
/// ```
///
/// # 所有权
/// `PacketBuf` 只能移动，不实现 `Clone`。交给下层或上层后发送方不再持有它；
/// 需要独立副本时显式调用 [`detach`](PacketBuf::detach)。
pub struct PacketBuf {
    /// 底层存储，长度即容量
    data: Vec<u8>,
    /// 窗口起始位置
    offset: usize,
    /// 窗口长度
    len: usize,
    /// 网络层头部位置（由 IP 接收路径记录）
    network_header: Option<usize>,
}

impl PacketBuf {
    /// 分配一个空缓冲区，窗口位于容量中央，两端都可以增长
    pub fn new(capacity: usize) -> Self {
        let mut buf = Self {
            data: vec![0; capacity],
            offset: 0,
            len: 0,
            network_header: None,
        };
        buf.reset();
        buf
    }

    /// 分配包含 `len` 字节零数据的缓冲区
    ///
    /// # 说明
    /// - 头部预留 `NET_BUF_HEADROOM` 字节用于添加协议头
    /// - 尾部预留 `NET_BUF_TAILROOM` 字节用于以太网填充
    pub fn alloc(len: usize) -> Self {
        Self {
            data: vec![0; NET_BUF_HEADROOM + len + NET_BUF_TAILROOM],
            offset: NET_BUF_HEADROOM,
            len,
            network_header: None,
        }
    }

    /// 分配缓冲区并复制数据
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::alloc(bytes.len());
        buf.as_mut_slice().copy_from_slice(bytes);
        buf
    }

    /// 重置窗口为空并移回容量中央
    pub fn reset(&mut self) {
        self.offset = self.data.len() / 2;
        self.len = 0;
        self.network_header = None;
    }

    /// 生成与当前窗口内容相同的独立缓冲区
    ///
    /// # 说明
    /// 只复制窗口内的数据，新缓冲区重新预留头部和尾部空间，
    /// 原缓冲区之后可以被继续使用或修改。
    pub fn detach(&self) -> PacketBuf {
        PacketBuf::from_slice(self.as_slice())
    }

    /// 在数据头部添加 `len` 字节
    ///
    /// # 返回
    /// 新暴露区域的可变切片（保留该区域原有内容，由调用方填写协议头）
    ///
    /// # 说明
    /// - offset 减少，len 增加
    /// - headroom 不足时返回 `NoBufferSpace`，窗口不变
    pub fn push_header(&mut self, len: usize) -> Result<&mut [u8], NetError> {
        if self.offset < len {
            return Err(NetError::NoBufferSpace);
        }

        self.offset -= len;
        self.len += len;
        let start = self.offset;
        Ok(&mut self.data[start..start + len])
    }

    /// 从数据头部移除 `len` 字节
    pub fn pop_header(&mut self, len: usize) -> Result<(), NetError> {
        if len > self.len {
            return Err(NetError::BufferUnderflow);
        }

        self.offset += len;
        self.len -= len;
        Ok(())
    }

    /// 在数据尾部添加 `len` 字节零填充
    ///
    /// # 返回
    /// 新添加区域的可变切片
    pub fn add_trailer(&mut self, len: usize) -> Result<&mut [u8], NetError> {
        let end = self.offset + self.len;
        if end + len > self.data.len() {
            return Err(NetError::NoBufferSpace);
        }

        self.len += len;
        let trailer = &mut self.data[end..end + len];
        trailer.fill(0);
        Ok(trailer)
    }

    /// 从数据尾部移除 `len` 字节
    pub fn remove_trailer(&mut self, len: usize) -> Result<(), NetError> {
        if len > self.len {
            return Err(NetError::BufferUnderflow);
        }

        self.len -= len;
        Ok(())
    }

    /// 截断窗口到 `len` 字节（不能变长）
    pub fn truncate(&mut self, len: usize) -> Result<(), NetError> {
        if len > self.len {
            return Err(NetError::InvalidArgument);
        }
        self.remove_trailer(self.len - len)
    }

    /// 记录当前窗口起始位置为网络层头部
    pub fn set_network_header(&mut self) {
        self.network_header = Some(self.offset);
    }

    /// 重新暴露已弹出的网络层头部
    ///
    /// # 说明
    /// 窗口起始位置移回 [`set_network_header`](Self::set_network_header)
    /// 记录的位置，头部字节在弹出后一直保留在缓冲区中。
    pub fn push_network_header(&mut self) -> Result<(), NetError> {
        let start = self.network_header.ok_or(NetError::InvalidArgument)?;
        if start > self.offset {
            return Err(NetError::InvalidArgument);
        }
        self.push_header(self.offset - start).map(|_| ())
    }

    /// 窗口数据
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// 可变窗口数据
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..self.offset + self.len]
    }

    /// 获取数据长度
    pub fn len(&self) -> usize {
        self.len
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// 头部剩余空间
    pub fn headroom(&self) -> usize {
        self.offset
    }

    /// 尾部剩余空间
    pub fn tailroom(&self) -> usize {
        self.data.len() - self.offset - self.len
    }
}

// 只打印元数据，不打印报文内容
impl fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuf")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .finish()
    }
}
