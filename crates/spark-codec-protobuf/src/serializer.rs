//! 序列化入口。
//!
//! # 教案式说明
//! - **意图 (Why)**：把"解析编解码器 → 构造游标 → 编解码根值"收敛为少量入口，调用方不必接触游标；
//! - **契约 (What)**：
//!   - 每个入口既是 [`CodecRegistry`] 的方法，也有使用 [`CodecRegistry::global`] 的同名自由函数；
//!   - 根值编码：消息写出消息体，集合写出字段 1 形式，标量写出裸负载；解码走 `parse_root`，与之对称；
//!   - [`deep_clone`] 先算尺寸，再从 [`BufferPool`] 租借恰好等长的缓冲编码后解码；
//!     实际写出字节数与预算尺寸不符时返回 [`ProtoError::SizeMismatch`]；
//! - **执行逻辑 (How)**：显式编解码器变体（`*_with_codec`）绕过注册表，适用于同一类型需要多种线上布局的场景。

use std::io::{Read, Write};

use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::framing::{
    DeserializeItems, FrameOutcome, PrefixStyle, read_length_prefixed, write_length_prefixed,
};
use crate::options::CodecOptions;
use crate::pool::BufferPool;
use crate::reader::ReaderContext;
use crate::registry::{CodecRegistry, ProtoType};
use crate::writer::{ByteSink, FlatBuffer, StreamSink, WriterContext};

/// 以显式编码器把根值写入字节汇。
pub fn serialize_with_codec<T: 'static>(
    sink: &mut dyn ByteSink,
    value: &T,
    writer: &dyn ProtoWriter<T>,
) -> Result<()> {
    let mut ctx = WriterContext::new(sink);
    writer.write_to(&mut ctx, value)
}

/// 以显式解码器解析根值。
pub fn deserialize_with_codec<T: 'static>(
    bytes: &[u8],
    reader: &dyn ProtoReader<T>,
    options: &CodecOptions,
) -> Result<T> {
    let mut ctx = ReaderContext::with_options(bytes, options)?;
    reader.parse_root(&mut ctx)
}

impl CodecRegistry {
    /// 把根值写入字节汇。
    pub fn serialize<T: ProtoType>(&self, sink: &mut dyn ByteSink, value: &T) -> Result<()> {
        serialize_with_codec(sink, value, self.writer::<T>()?.as_ref())
    }

    /// 把根值编码为新分配的字节向量。
    pub fn serialize_to_vec<T: ProtoType>(&self, value: &T) -> Result<Vec<u8>> {
        let writer = self.writer::<T>()?;
        let mut out = Vec::with_capacity(writer.calculate_size(value));
        serialize_with_codec(&mut out, value, writer.as_ref())?;
        Ok(out)
    }

    /// 把根值写入同步流；流在返回后仍归调用方。
    pub fn serialize_to_writer<T: ProtoType, W: Write>(&self, destination: &mut W, value: &T) -> Result<()> {
        let writer = self.writer::<T>()?;
        let mut sink = StreamSink::with_capacity(destination, self.options().buffer_size, true);
        serialize_with_codec(&mut sink, value, writer.as_ref())?;
        sink.dispose().map(|_| ())
    }

    /// 以注册表的运行参数解析根值。
    pub fn deserialize<T: ProtoType>(&self, bytes: &[u8]) -> Result<T> {
        self.deserialize_with(bytes, self.options())
    }

    /// 以给定运行参数解析根值。
    pub fn deserialize_with<T: ProtoType>(&self, bytes: &[u8], options: &CodecOptions) -> Result<T> {
        deserialize_with_codec(bytes, self.reader::<T>()?.as_ref(), options)
    }

    /// 经一次编码与解码得到独立副本。
    pub fn deep_clone<T: ProtoType>(&self, value: &T) -> Result<T> {
        let writer = self.writer::<T>()?;
        let reader = self.reader::<T>()?;
        let calculated = writer.calculate_size(value);
        let mut rented = BufferPool::shared().rent(calculated);
        let written = {
            let mut flat = FlatBuffer::new(&mut rented);
            let mut ctx = WriterContext::new(&mut flat);
            match writer.write_to(&mut ctx, value) {
                Ok(()) => ctx.written(),
                Err(ProtoError::OutOfSpace {
                    requested,
                    remaining,
                }) => calculated - remaining + requested,
                Err(other) => return Err(other),
            }
        };
        if written != calculated {
            return Err(ProtoError::SizeMismatch {
                type_name: std::any::type_name::<T>(),
                calculated,
                written,
            });
        }
        deserialize_with_codec(&rented, reader.as_ref(), self.options())
    }

    /// 以长度前缀写出一个值。
    pub fn serialize_with_length_prefix<T: ProtoType, W: Write>(
        &self,
        destination: &mut W,
        value: &T,
        style: PrefixStyle,
        field_number: u32,
    ) -> Result<()> {
        write_length_prefixed(
            destination,
            value,
            self.writer::<T>()?,
            style,
            field_number,
            self.options(),
        )
    }

    /// 读取下一个匹配的帧；字段号不匹配的帧被跳过，流干净结束时返回 `None`。
    pub fn deserialize_with_length_prefix<T: ProtoType, R: Read>(
        &self,
        source: &mut R,
        style: PrefixStyle,
        field_number: u32,
    ) -> Result<Option<T>> {
        let reader = self.reader::<T>()?;
        loop {
            match read_length_prefixed(source, reader.clone(), style, field_number, self.options())? {
                FrameOutcome::Item(item) => return Ok(Some(item)),
                FrameOutcome::Skipped { .. } => continue,
                FrameOutcome::End => return Ok(None),
            }
        }
    }

    /// 逐帧读取流中所有匹配的值。
    pub fn deserialize_items<T: ProtoType, R: Read>(
        &self,
        source: R,
        style: PrefixStyle,
        field_number: u32,
    ) -> Result<DeserializeItems<T, R>> {
        Ok(DeserializeItems::new(
            source,
            self.reader::<T>()?,
            style,
            field_number,
            self.options().clone(),
        ))
    }
}

/// 经全局注册表把根值写入字节汇。
pub fn serialize<T: ProtoType>(sink: &mut dyn ByteSink, value: &T) -> Result<()> {
    CodecRegistry::global().serialize(sink, value)
}

/// 经全局注册表把根值编码为字节向量。
pub fn serialize_to_vec<T: ProtoType>(value: &T) -> Result<Vec<u8>> {
    CodecRegistry::global().serialize_to_vec(value)
}

/// 经全局注册表把根值写入同步流。
pub fn serialize_to_writer<T: ProtoType, W: Write>(destination: &mut W, value: &T) -> Result<()> {
    CodecRegistry::global().serialize_to_writer(destination, value)
}

/// 经全局注册表解析根值。
pub fn deserialize<T: ProtoType>(bytes: &[u8]) -> Result<T> {
    CodecRegistry::global().deserialize(bytes)
}

/// 经全局注册表以给定运行参数解析根值。
pub fn deserialize_with<T: ProtoType>(bytes: &[u8], options: &CodecOptions) -> Result<T> {
    CodecRegistry::global().deserialize_with(bytes, options)
}

/// 经全局注册表深拷贝。
pub fn deep_clone<T: ProtoType>(value: &T) -> Result<T> {
    CodecRegistry::global().deep_clone(value)
}

/// 经全局注册表以长度前缀写出一个值。
pub fn serialize_with_length_prefix<T: ProtoType, W: Write>(
    destination: &mut W,
    value: &T,
    style: PrefixStyle,
    field_number: u32,
) -> Result<()> {
    CodecRegistry::global().serialize_with_length_prefix(destination, value, style, field_number)
}

/// 经全局注册表读取下一个匹配的帧。
pub fn deserialize_with_length_prefix<T: ProtoType, R: Read>(
    source: &mut R,
    style: PrefixStyle,
    field_number: u32,
) -> Result<Option<T>> {
    CodecRegistry::global().deserialize_with_length_prefix(source, style, field_number)
}

/// 经全局注册表逐帧读取。
pub fn deserialize_items<T: ProtoType, R: Read>(
    source: R,
    style: PrefixStyle,
    field_number: u32,
) -> Result<DeserializeItems<T, R>> {
    CodecRegistry::global().deserialize_items(source, style, field_number)
}
