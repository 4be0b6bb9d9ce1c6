//! 编码游标。
//!
//! # 教案式说明
//! - **意图 (Why)**：与 [`ReaderContext`](crate::ReaderContext) 对称，为编码器提供原语写入与标签写入；
//! - **契约 (What)**：每个 `write_*` 写出的字节数与 [`crate::wire`] 中对应的尺寸函数严格一致，
//!   长度前缀依赖该不变量先算后写；
//! - **执行逻辑 (How)**：游标持有 `&mut dyn ByteSink`，自身只记录本次调用写出的字节数，
//!   越界与 I/O 错误由具体字节汇报告。

mod sink;

pub use sink::{ByteSink, FlatBuffer, StreamSink};

use crate::error::Result;
use crate::wire::{self, MAX_VARINT64_BYTES, WireType, make_tag};

/// 编码游标。
pub struct WriterContext<'s> {
    sink: &'s mut dyn ByteSink,
    written: usize,
}

impl std::fmt::Debug for WriterContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterContext")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl<'s> WriterContext<'s> {
    /// 在字节汇上构造游标。
    pub fn new(sink: &'s mut dyn ByteSink) -> Self {
        Self { sink, written: 0 }
    }

    /// 本游标写出的字节数。
    pub fn written(&self) -> usize {
        self.written
    }

    /// 下刷底层字节汇。
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    /// 写入原始字节。
    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.put_slice(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    /// 写入 32 位 varint。
    pub fn write_raw_varint32(&mut self, value: u32) -> Result<()> {
        self.write_raw_varint64(u64::from(value))
    }

    /// 写入 64 位 varint。
    pub fn write_raw_varint64(&mut self, value: u64) -> Result<()> {
        let mut scratch = [0u8; MAX_VARINT64_BYTES];
        let len = wire::encode_varint64(value, &mut scratch);
        self.write_raw_bytes(&scratch[..len])
    }

    /// 写入小端 4 字节。
    pub fn write_raw_little_endian32(&mut self, value: u32) -> Result<()> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    /// 写入小端 8 字节。
    pub fn write_raw_little_endian64(&mut self, value: u64) -> Result<()> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    /// 写入大端 4 字节，仅供 `Fixed32BigEndian` 分帧使用。
    pub fn write_fixed32_big_endian(&mut self, value: u32) -> Result<()> {
        self.write_raw_bytes(&value.to_be_bytes())
    }

    /// 写入已组合好的标签。
    pub fn write_tag(&mut self, tag: u32) -> Result<()> {
        self.write_raw_varint32(tag)
    }

    /// 组合字段号与线类型后写入标签。
    pub fn write_field_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        self.write_tag(make_tag(field_number, wire_type))
    }

    /// 写入长度前缀。
    pub fn write_length(&mut self, length: usize) -> Result<()> {
        self.write_raw_varint64(length as u64)
    }

    /// 写入 `double`。
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_raw_little_endian64(value.to_bits())
    }

    /// 写入 `float`。
    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_raw_little_endian32(value.to_bits())
    }

    /// 写入 `uint32`。
    pub fn write_uint32(&mut self, value: u32) -> Result<()> {
        self.write_raw_varint32(value)
    }

    /// 写入 `int32`；负数按 64 位符号扩展。
    pub fn write_int32(&mut self, value: i32) -> Result<()> {
        if value >= 0 {
            self.write_raw_varint32(value as u32)
        } else {
            self.write_raw_varint64(i64::from(value) as u64)
        }
    }

    /// 写入 `uint64`。
    pub fn write_uint64(&mut self, value: u64) -> Result<()> {
        self.write_raw_varint64(value)
    }

    /// 写入 `int64`。
    pub fn write_int64(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(value as u64)
    }

    /// 写入 `fixed32`。
    pub fn write_fixed32(&mut self, value: u32) -> Result<()> {
        self.write_raw_little_endian32(value)
    }

    /// 写入 `fixed64`。
    pub fn write_fixed64(&mut self, value: u64) -> Result<()> {
        self.write_raw_little_endian64(value)
    }

    /// 写入 `sfixed32`。
    pub fn write_sfixed32(&mut self, value: i32) -> Result<()> {
        self.write_raw_little_endian32(value as u32)
    }

    /// 写入 `sfixed64`。
    pub fn write_sfixed64(&mut self, value: i64) -> Result<()> {
        self.write_raw_little_endian64(value as u64)
    }

    /// 写入 `sint32`。
    pub fn write_sint32(&mut self, value: i32) -> Result<()> {
        self.write_raw_varint32(wire::encode_zigzag32(value))
    }

    /// 写入 `sint64`。
    pub fn write_sint64(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(wire::encode_zigzag64(value))
    }

    /// 写入 `bool`。
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_raw_bytes(&[u8::from(value)])
    }

    /// 写入枚举底层整数。
    pub fn write_enum(&mut self, value: i32) -> Result<()> {
        self.write_int32(value)
    }

    /// 写入长度前缀 + UTF-8 字节。
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// 写入长度前缀 + 字节。
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_length(value.len())?;
        self.write_raw_bytes(value)
    }
}
