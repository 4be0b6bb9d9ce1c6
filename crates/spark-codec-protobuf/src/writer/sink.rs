//! 写游标背后的字节汇。
//!
//! # 教案式说明
//! - **意图 (Why)**：编码端既要写入可增长的内存缓冲，也要写入定容平面缓冲（`deep_clone`、预分配场景）
//!   以及同步流；三者抽象成 [`ByteSink`]，写游标只依赖这一最小接口；
//! - **契约 (What)**：
//!   - [`FlatBuffer`] 容量不足时返回 [`ProtoError::OutOfSpace`]，且本次写入不提交任何字节；
//!   - [`StreamSink`] 内部缓冲写满即自动下刷；[`StreamSink::dispose`] 必须下刷，并按 `leave_open`
//!     决定归还还是关闭底层流；
//! - **设计权衡 (Trade-offs)**：`StreamSink` 在 `Drop` 中只能尽力下刷，失败仅记录 `warn` 日志；
//!   需要确认写出结果的调用方应显式调用 `dispose`。

use std::io::Write;

use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::error::{ProtoError, Result};
use crate::options::DEFAULT_BUFFER_SIZE;

/// 写游标使用的最小字节汇接口。
pub trait ByteSink {
    /// 追加一段字节。
    fn put_slice(&mut self, src: &[u8]) -> Result<()>;

    /// 把已缓冲的数据推送到最终目的地。
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

impl ByteSink for BytesMut {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        BufMut::put_slice(self, src);
        Ok(())
    }
}

/// 定容平面缓冲。
#[derive(Debug)]
pub struct FlatBuffer<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> FlatBuffer<'a> {
    /// 包装调用方提供的定长切片，从头开始写。
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// 已写入字节数。
    pub fn position(&self) -> usize {
        self.position
    }

    /// 剩余容量。
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// 已写入部分的视图。
    pub fn written(&self) -> &[u8] {
        &self.buffer[..self.position]
    }
}

impl ByteSink for FlatBuffer<'_> {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if src.len() > remaining {
            return Err(ProtoError::OutOfSpace {
                requested: src.len(),
                remaining,
            });
        }
        let end = self.position + src.len();
        self.buffer[self.position..end].copy_from_slice(src);
        self.position = end;
        Ok(())
    }
}

/// 同步流上的带缓冲写入适配器。
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    inner: Option<W>,
    buffer: Vec<u8>,
    capacity: usize,
    leave_open: bool,
}

impl<W: Write> StreamSink<W> {
    /// 以默认 4096 字节缓冲包装流；释放时关闭流。
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE, false)
    }

    /// 指定缓冲大小与释放策略。
    pub fn with_capacity(inner: W, capacity: usize, leave_open: bool) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Some(inner),
            buffer: Vec::with_capacity(capacity),
            capacity,
            leave_open,
        }
    }

    /// 尚未下刷的字节数。
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn stream(&mut self) -> Result<&mut W> {
        self.inner.as_mut().ok_or_else(closed_stream)
    }

    fn drain_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Self { inner, buffer, .. } = self;
        let stream = inner.as_mut().ok_or_else(closed_stream)?;
        stream.write_all(buffer.as_slice()).map_err(ProtoError::Io)?;
        buffer.clear();
        Ok(())
    }

    /// 下刷缓冲并释放适配器。
    ///
    /// `leave_open` 为真时归还底层流，否则在此处丢弃（关闭）它并返回 `None`。
    pub fn dispose(mut self) -> Result<Option<W>> {
        self.flush()?;
        let inner = self.inner.take();
        if self.leave_open {
            Ok(inner)
        } else {
            drop(inner);
            Ok(None)
        }
    }
}

/// dispose 之后 inner 为空，此时任何写入都视为流已关闭。
fn closed_stream() -> ProtoError {
    ProtoError::Io(std::io::ErrorKind::BrokenPipe.into())
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        if self.buffer.len() + src.len() > self.capacity {
            self.drain_buffer()?;
        }
        if src.len() >= self.capacity {
            return self.stream()?.write_all(src).map_err(ProtoError::Io);
        }
        self.buffer.extend_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.drain_buffer()?;
        self.stream()?.flush().map_err(ProtoError::Io)
    }
}

impl<W: Write> Drop for StreamSink<W> {
    fn drop(&mut self) {
        if self.inner.is_none() {
            return;
        }
        if let Err(err) = ByteSink::flush(self) {
            warn!(error = %err, "stream sink dropped with unflushed bytes");
        }
    }
}
