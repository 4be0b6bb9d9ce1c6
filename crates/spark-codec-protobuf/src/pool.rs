//! 深拷贝使用的定长暂存缓冲池。
//!
//! # 教案式说明
//! - **意图 (Why)**：`deep_clone` 每次都要"按精确尺寸编码再解码"，热路径上反复分配同量级的
//!   `Vec<u8>` 会放大分配器压力；复用自由链表中的旧缓冲即可消除大部分分配；
//! - **契约 (What)**：
//!   - [`BufferPool::rent`] 返回长度恰为 `len`、内容全零的可写切片；
//!   - [`RentedBuffer`] 在 `Drop` 时自动归还，池满或缓冲过大时直接释放；
//!   - 池内共享状态只由 `spin::Mutex` 保护，临界区内不做任何分配；
//! - **设计权衡 (Trade-offs)**：租借时线性扫描自由链表寻找首个足够大的缓冲，
//!   链表长度受 `max_pooled` 约束，扫描成本可以忽略。

use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

/// 默认最多保留的空闲缓冲数。
pub const DEFAULT_MAX_POOLED: usize = 32;

/// 超过该容量的缓冲归还时直接释放，避免一次峰值长期占用内存。
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 1 << 20;

/// 缓冲池统计快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 当前空闲缓冲数。
    pub available: usize,
    /// 命中自由链表的租借次数。
    pub reused: u64,
    /// 新分配的次数。
    pub allocated: u64,
}

/// 基于自由链表的字节缓冲池。
#[derive(Debug)]
pub struct BufferPool {
    free_list: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    max_retained_capacity: usize,
    reused: AtomicU64,
    allocated: AtomicU64,
}

impl BufferPool {
    /// 以默认上限构造。
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_POOLED, DEFAULT_MAX_RETAINED_CAPACITY)
    }

    /// 指定空闲缓冲数上限与单个缓冲的保留容量上限。
    pub fn with_limits(max_pooled: usize, max_retained_capacity: usize) -> Self {
        Self {
            free_list: Mutex::new(Vec::new()),
            max_pooled,
            max_retained_capacity,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// 进程级共享池。
    pub fn shared() -> &'static BufferPool {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED.get_or_init(BufferPool::new)
    }

    /// 租借长度恰为 `len` 的零填充缓冲。
    pub fn rent(&self, len: usize) -> RentedBuffer<'_> {
        let reused = {
            let mut list = self.free_list.lock();
            let found = list.iter().position(|buf| buf.capacity() >= len);
            found.map(|index| list.swap_remove(index))
        };
        let mut buffer = match reused {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(len)
            }
        };
        buffer.clear();
        buffer.resize(len, 0);
        RentedBuffer {
            pool: self,
            buffer: Some(buffer),
        }
    }

    /// 统计快照。
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free_list.lock().len(),
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
        }
    }

    /// 清空自由链表，返回释放的缓冲数。
    pub fn shrink(&self) -> usize {
        let drained = std::mem::take(&mut *self.free_list.lock());
        drained.len()
    }

    fn give_back(&self, buffer: Vec<u8>) {
        if buffer.capacity() > self.max_retained_capacity {
            return;
        }
        let mut list = self.free_list.lock();
        if list.len() < self.max_pooled {
            list.push(buffer);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// 租借中的缓冲，离开作用域时归还到来源池。
#[derive(Debug)]
pub struct RentedBuffer<'p> {
    pool: &'p BufferPool,
    buffer: Option<Vec<u8>>,
}

impl Deref for RentedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl DerefMut for RentedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for RentedBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.give_back(buffer);
        }
    }
}
