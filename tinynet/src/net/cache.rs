//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 带老化的键值缓存
//!
//! ARP 表、ARP 待发送缓存和 UDP 端口表共用这一结构。
//! 过期只在查询时惰性判断，没有后台定时清理。

use alloc::vec::Vec;

use crate::errno::NetError;

/// 值的存储策略，构造时确定
pub enum CachePolicy<V> {
    /// 直接保存调用方交入的值
    Share,
    /// 保存 `copy` 生成的独立副本
    DeepCopy(fn(&V) -> V),
}

/// 缓存条目
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    /// 键
    pub key: K,
    /// 值
    pub value: V,
    /// 创建或最近一次 `set` 的时间 (毫秒)
    pub timestamp: u64,
}

/// 带老化的缓存
///
/// # 说明
/// - 条目按插入顺序保存，`set` 已有键时原地刷新
/// - `ttl_ms == 0` 表示永不过期
/// - 容量固定，满时先清理过期条目，仍然满则返回 `CacheFull`
pub struct AgingCache<K, V> {
    entries: Vec<CacheEntry<K, V>>,
    ttl_ms: u64,
    capacity: usize,
    policy: CachePolicy<V>,
}

impl<K: Copy + PartialEq, V> AgingCache<K, V> {
    /// 创建缓存
    ///
    /// # 参数
    /// - `ttl_ms`: 条目存活时间，0 为永不过期
    /// - `capacity`: 最大条目数
    /// - `policy`: 值的存储策略
    pub fn new(ttl_ms: u64, capacity: usize, policy: CachePolicy<V>) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ttl_ms,
            capacity,
            policy,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<K, V>, now: u64) -> bool {
        self.ttl_ms != 0 && now.saturating_sub(entry.timestamp) > self.ttl_ms
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == *key)
    }

    /// 插入或刷新条目
    ///
    /// # 说明
    /// 已存在的键会替换值并刷新时间戳，位置不变
    pub fn set(&mut self, key: K, value: V, now: u64) -> Result<(), NetError> {
        let value = match &self.policy {
            CachePolicy::Share => value,
            CachePolicy::DeepCopy(copy) => copy(&value),
        };

        if let Some(idx) = self.position(&key) {
            let entry = &mut self.entries[idx];
            entry.value = value;
            entry.timestamp = now;
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                return Err(NetError::CacheFull);
            }
        }

        self.entries.push(CacheEntry {
            key,
            value,
            timestamp: now,
        });
        Ok(())
    }

    /// 查找条目
    ///
    /// # 返回
    /// 不存在或已过期返回 None，过期条目同时被删除；查询不刷新时间戳
    pub fn get(&mut self, key: &K, now: u64) -> Option<&V> {
        let idx = self.live_position(key, now)?;
        Some(&self.entries[idx].value)
    }

    /// 检查是否存在未过期的条目
    pub fn contains(&mut self, key: &K, now: u64) -> bool {
        self.live_position(key, now).is_some()
    }

    /// 取出未过期的条目并从缓存中删除
    pub fn take(&mut self, key: &K, now: u64) -> Option<V> {
        let idx = self.live_position(key, now)?;
        Some(self.entries.remove(idx).value)
    }

    /// 删除条目，不存在时什么也不做
    pub fn delete(&mut self, key: &K) {
        if let Some(idx) = self.position(key) {
            self.entries.remove(idx);
        }
    }

    /// 按插入顺序访问所有未过期条目
    pub fn for_each<F>(&self, now: u64, mut visitor: F)
    where
        F: FnMut(&K, &V, u64),
    {
        for entry in self.entries.iter() {
            if !self.is_expired(entry, now) {
                visitor(&entry.key, &entry.value, entry.timestamp);
            }
        }
    }

    /// 删除所有过期条目
    pub fn purge_expired(&mut self, now: u64) {
        let ttl_ms = self.ttl_ms;
        if ttl_ms == 0 {
            return;
        }
        self.entries
            .retain(|entry| now.saturating_sub(entry.timestamp) <= ttl_ms);
    }

    /// 当前保存的条目数（包括尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_position(&mut self, key: &K, now: u64) -> Option<usize> {
        let idx = self.position(key)?;
        if self.is_expired(&self.entries[idx], now) {
            self.entries.remove(idx);
            return None;
        }
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::buffer::PacketBuf;

    #[test]
    fn test_set_then_get() {
        let mut cache = AgingCache::new(1000, 4, CachePolicy::Share);
        cache.set([192, 168, 1, 1], [1u8; 6], 0).unwrap();
        assert_eq!(cache.get(&[192, 168, 1, 1], 0), Some(&[1u8; 6]));
        assert_eq!(cache.get(&[192, 168, 1, 2], 0), None);
    }

    #[test]
    fn test_entry_expires() {
        let mut cache = AgingCache::new(1000, 4, CachePolicy::Share);
        cache.set(1u16, 10u32, 0).unwrap();
        assert_eq!(cache.get(&1, 1000), Some(&10));
        assert_eq!(cache.get(&1, 1001), None);
        // 过期条目在查询时被删除
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_does_not_refresh() {
        let mut cache = AgingCache::new(100, 4, CachePolicy::Share);
        cache.set(1u16, 10u32, 0).unwrap();
        assert!(cache.get(&1, 90).is_some());
        assert!(cache.get(&1, 150).is_none());
    }

    #[test]
    fn test_set_refreshes_timestamp() {
        let mut cache = AgingCache::new(100, 4, CachePolicy::Share);
        cache.set(1u16, 10u32, 0).unwrap();
        cache.set(1u16, 20u32, 90).unwrap();
        assert_eq!(cache.get(&1, 150), Some(&20));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let mut cache = AgingCache::new(0, 4, CachePolicy::Share);
        cache.set(80u16, 1u8, 0).unwrap();
        assert_eq!(cache.get(&80, u64::MAX), Some(&1));
    }

    #[test]
    fn test_delete() {
        let mut cache = AgingCache::new(0, 4, CachePolicy::Share);
        cache.set(80u16, 1u8, 0).unwrap();
        cache.delete(&80);
        assert_eq!(cache.get(&80, 0), None);
        // 不存在的键
        cache.delete(&81);
    }

    #[test]
    fn test_capacity_full() {
        let mut cache = AgingCache::new(100, 2, CachePolicy::Share);
        cache.set(1u16, 1u8, 0).unwrap();
        cache.set(2u16, 2u8, 0).unwrap();
        assert_eq!(cache.set(3u16, 3u8, 50), Err(NetError::CacheFull));
        // 刷新已有键不受容量限制
        assert!(cache.set(2u16, 4u8, 50).is_ok());
        // 过期条目会被清理出空间
        assert!(cache.set(3u16, 3u8, 120).is_ok());
        assert_eq!(cache.get(&1, 120), None);
    }

    #[test]
    fn test_for_each_insertion_order() {
        let mut cache = AgingCache::new(100, 4, CachePolicy::Share);
        cache.set(3u16, 'c', 0).unwrap();
        cache.set(1u16, 'a', 50).unwrap();
        cache.set(2u16, 'b', 60).unwrap();

        let mut seen = Vec::new();
        cache.for_each(120, |key, value, ts| seen.push((*key, *value, ts)));
        // key 3 已过期
        assert_eq!(seen, [(1, 'a', 50), (2, 'b', 60)]);
    }

    #[test]
    fn test_deep_copy_policy() {
        let mut cache = AgingCache::new(0, 1, CachePolicy::DeepCopy(PacketBuf::detach));

        let mut scratch = PacketBuf::new(2048);
        scratch.add_trailer(8).unwrap().copy_from_slice(b"datagram");
        cache.set(7u16, scratch, 0).unwrap();

        let stored = cache.take(&7, 0).unwrap();
        assert_eq!(stored.as_slice(), b"datagram");
        // 保存的是只包含窗口数据的紧凑副本
        assert!(stored.capacity() < 2048);
        assert!(cache.is_empty());
    }
}
