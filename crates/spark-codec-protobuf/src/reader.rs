//! 解码游标。
//!
//! # 教案式说明
//! - **意图 (Why)**：为所有类型解码器提供唯一的有状态入口：原语读取、标签解析、长度界定区域嵌套与递归深度守卫；
//! - **契约 (What)**：
//!   - `position ≤ size` 恒成立；处于长度界定区域内时 `position ≤ current_limit`；
//!   - [`ReaderContext::read_tag`] 在逻辑末尾（缓冲末尾或当前限界）返回 0，调用方不得把 0 当作字段号 0 的标签；
//!   - 进入嵌套消息时深度 +1，深度达到上限返回 [`ProtoError::RecursionLimitExceeded`]；
//! - **执行逻辑 (How)**：游标借用调用方的 `&[u8]`，只在单次解码调用内存活，按 `&mut` 在调用链中传递，
//!   从不被共享或存储。

use tracing::trace;

use crate::error::{ProtoError, Result};
use crate::options::{CodecOptions, DEFAULT_RECURSION_LIMIT};
use crate::unknown::UnknownFields;
use crate::wire::{
    self, FIXED32_SIZE, FIXED64_SIZE, WireType, make_tag, tag_field_number,
    tag_wire_type,
};

/// 基于字节切片的解码游标。
#[derive(Debug)]
pub struct ReaderContext<'a> {
    buffer: &'a [u8],
    position: usize,
    bytes_before_window: usize,
    current_limit: usize,
    recursion_depth: u32,
    recursion_limit: u32,
    size_limit: usize,
    last_tag: u32,
    discard_unknown_fields: bool,
}

impl<'a> ReaderContext<'a> {
    /// 以默认参数构造游标。
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            bytes_before_window: 0,
            current_limit: usize::MAX,
            recursion_depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: usize::MAX,
            last_tag: 0,
            discard_unknown_fields: false,
        }
    }

    /// 以给定参数构造游标；输入超过尺寸上限时立即失败。
    pub fn with_options(buffer: &'a [u8], options: &CodecOptions) -> Result<Self> {
        if buffer.len() > options.size_limit {
            return Err(ProtoError::SizeLimitExceeded {
                size: buffer.len(),
                limit: options.size_limit,
            });
        }
        let mut ctx = Self::new(buffer);
        ctx.recursion_limit = options.recursion_limit;
        ctx.size_limit = options.size_limit;
        ctx.discard_unknown_fields = options.discard_unknown_fields;
        Ok(ctx)
    }

    /// 声明当前窗口之前已经从外部流消费的字节数，仅影响 [`Self::total_bytes_consumed`]。
    pub fn with_window_offset(mut self, bytes_before_window: usize) -> Self {
        self.bytes_before_window = bytes_before_window;
        self
    }

    /// 当前读位置。
    pub fn position(&self) -> usize {
        self.position
    }

    /// 自流起点累计消费的字节数。
    pub fn total_bytes_consumed(&self) -> usize {
        self.bytes_before_window + self.position
    }

    /// 最近一次 [`Self::read_tag`] 的结果。
    pub fn last_tag(&self) -> u32 {
        self.last_tag
    }

    /// 当前嵌套深度。
    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// 生效的递归上限。
    pub fn recursion_limit(&self) -> u32 {
        self.recursion_limit
    }

    /// 生效的尺寸上限。
    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// 是否丢弃未知字段。
    pub fn discard_unknown_fields(&self) -> bool {
        self.discard_unknown_fields
    }

    /// 当前区域的逻辑末尾，永不超过物理缓冲长度。
    fn end(&self) -> usize {
        self.current_limit.min(self.buffer.len())
    }

    /// 当前区域剩余字节数。
    pub fn remaining(&self) -> usize {
        self.end() - self.position
    }

    /// 是否到达当前区域末尾。
    pub fn is_at_end(&self) -> bool {
        self.position >= self.end()
    }

    /// 读取下一个标签；到达逻辑末尾返回 0。
    pub fn read_tag(&mut self) -> Result<u32> {
        if self.is_at_end() {
            self.last_tag = 0;
            return Ok(0);
        }
        let tag = self.read_raw_varint32()?;
        if tag_field_number(tag) == 0 {
            return Err(ProtoError::InvalidTag(tag));
        }
        tag_wire_type(tag)?;
        self.last_tag = tag;
        Ok(tag)
    }

    /// 若下一个标签恰为 `tag` 则消费之并返回 `true`，否则不移动游标。
    ///
    /// 非打包重复字段用它在同一字段号的连续出现之间前进。
    pub fn maybe_consume_tag(&mut self, tag: u32) -> Result<bool> {
        if self.is_at_end() {
            return Ok(false);
        }
        let (peeked, consumed) = match wire::decode_varint32(&self.buffer[self.position..self.end()]) {
            Ok(pair) => pair,
            // 末尾处残缺的标签留给下一次 read_tag 报告。
            Err(_) => return Ok(false),
        };
        if peeked != tag {
            return Ok(false);
        }
        self.position += consumed;
        self.last_tag = tag;
        Ok(true)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(ProtoError::TruncatedMessage);
        }
        let buffer = self.buffer;
        let start = self.position;
        self.position += len;
        Ok(&buffer[start..start + len])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// 读取严格的 32 位 varint（最多 5 字节）。
    pub fn read_raw_varint32(&mut self) -> Result<u32> {
        let window = &self.buffer[self.position..self.end()];
        let (value, consumed) = wire::decode_varint32(window)?;
        self.position += consumed;
        Ok(value)
    }

    /// 读取 64 位 varint（最多 10 字节）。
    pub fn read_raw_varint64(&mut self) -> Result<u64> {
        let window = &self.buffer[self.position..self.end()];
        let (value, consumed) = wire::decode_varint64(window)?;
        self.position += consumed;
        Ok(value)
    }

    /// 读取小端 4 字节。
    pub fn read_raw_little_endian32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array::<FIXED32_SIZE>()?))
    }

    /// 读取小端 8 字节。
    pub fn read_raw_little_endian64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array::<FIXED64_SIZE>()?))
    }

    /// 读取 `double`。
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_raw_little_endian64()?))
    }

    /// 读取 `float`。
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_raw_little_endian32()?))
    }

    /// 读取 `uint32`。
    pub fn read_uint32(&mut self) -> Result<u32> {
        self.read_raw_varint32()
    }

    /// 读取 `int32`；接受负数的 10 字节符号扩展形式。
    pub fn read_int32(&mut self) -> Result<i32> {
        Ok(self.read_raw_varint64()? as i32)
    }

    /// 读取 `uint64`。
    pub fn read_uint64(&mut self) -> Result<u64> {
        self.read_raw_varint64()
    }

    /// 读取 `int64`。
    pub fn read_int64(&mut self) -> Result<i64> {
        Ok(self.read_raw_varint64()? as i64)
    }

    /// 读取 `fixed32`。
    pub fn read_fixed32(&mut self) -> Result<u32> {
        self.read_raw_little_endian32()
    }

    /// 读取 `fixed64`。
    pub fn read_fixed64(&mut self) -> Result<u64> {
        self.read_raw_little_endian64()
    }

    /// 读取 `sfixed32`。
    pub fn read_sfixed32(&mut self) -> Result<i32> {
        Ok(self.read_raw_little_endian32()? as i32)
    }

    /// 读取 `sfixed64`。
    pub fn read_sfixed64(&mut self) -> Result<i64> {
        Ok(self.read_raw_little_endian64()? as i64)
    }

    /// 读取 `sint32`。
    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(wire::decode_zigzag32(self.read_raw_varint32()?))
    }

    /// 读取 `sint64`。
    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(wire::decode_zigzag64(self.read_raw_varint64()?))
    }

    /// 读取 `bool`；任何非零 varint 视为 `true`。
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_raw_varint64()? != 0)
    }

    /// 读取枚举底层整数。
    pub fn read_enum(&mut self) -> Result<i32> {
        self.read_int32()
    }

    /// 读取长度前缀。
    pub fn read_length(&mut self) -> Result<usize> {
        Ok(self.read_raw_varint32()? as usize)
    }

    /// 读取长度界定的字节切片，借用原缓冲。
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_length()?;
        self.take(len)
    }

    /// 读取 UTF-8 字符串。
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtoError::InvalidUtf8)
    }

    /// 读取 `len` 个原始字节。
    pub fn read_raw_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// 推入新的区域限界，返回旧限界供 [`Self::pop_limit`] 恢复。
    ///
    /// 新限界越过物理缓冲或外层限界时返回 [`ProtoError::TruncatedMessage`]。
    pub fn push_limit(&mut self, len: usize) -> Result<usize> {
        let new_limit = self
            .position
            .checked_add(len)
            .ok_or(ProtoError::TruncatedMessage)?;
        if new_limit > self.end() {
            return Err(ProtoError::TruncatedMessage);
        }
        let old = self.current_limit;
        self.current_limit = new_limit;
        Ok(old)
    }

    /// 恢复旧限界。
    pub fn pop_limit(&mut self, old_limit: usize) {
        self.current_limit = old_limit;
    }

    /// 是否已读到当前限界。
    pub fn is_reached_limit(&self) -> bool {
        self.current_limit != usize::MAX && self.position >= self.current_limit
    }

    /// 读取长度前缀，在该区域内执行 `parse`，并确保区域被完整消费。
    pub fn read_length_delimited<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let len = self.read_length()?;
        let old = self.push_limit(len)?;
        let value = parse(self)?;
        if !self.is_reached_limit() {
            // 解析器提前返回时丢弃区域余量，保持外层游标对齐。
            let rest = self.remaining();
            self.take(rest)?;
        }
        self.pop_limit(old);
        Ok(value)
    }

    /// 读取一个嵌套消息：长度前缀 + 递归守卫 + 区域限界。
    pub fn read_message<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter_recursion()?;
        let value = self.read_length_delimited(parse);
        self.recursion_depth -= 1;
        value
    }

    fn enter_recursion(&mut self) -> Result<()> {
        if self.recursion_depth >= self.recursion_limit {
            return Err(ProtoError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        self.recursion_depth += 1;
        Ok(())
    }

    /// 跳过最近一次读到的标签对应的负载。
    ///
    /// 分组字段按字段号匹配 `EndGroup` 递归跳过，并计入递归深度。
    pub fn skip_last_field(&mut self) -> Result<()> {
        let tag = self.last_tag;
        if tag == 0 {
            return Err(ProtoError::InvalidTag(0));
        }
        trace!(
            field_number = tag_field_number(tag),
            wire_type = tag & wire::TAG_TYPE_MASK,
            "skipping unknown field"
        );
        match tag_wire_type(tag)? {
            WireType::Varint => {
                self.read_raw_varint64()?;
            }
            WireType::Fixed64 => {
                self.take(FIXED64_SIZE)?;
            }
            WireType::Fixed32 => {
                self.take(FIXED32_SIZE)?;
            }
            WireType::LengthDelimited => {
                let len = self.read_length()?;
                self.take(len)?;
            }
            WireType::StartGroup => self.skip_group(tag)?,
            WireType::EndGroup => return Err(ProtoError::InvalidTag(tag)),
        }
        Ok(())
    }

    fn skip_group(&mut self, start_tag: u32) -> Result<()> {
        self.enter_recursion()?;
        let end_tag = make_tag(tag_field_number(start_tag), WireType::EndGroup);
        let outcome = loop {
            let tag = match self.read_tag() {
                Ok(0) => break Err(ProtoError::TruncatedMessage),
                Ok(tag) => tag,
                Err(err) => break Err(err),
            };
            if tag == end_tag {
                break Ok(());
            }
            if let Err(err) = self.skip_last_field() {
                break Err(err);
            }
        };
        self.recursion_depth -= 1;
        outcome
    }

    /// 把最近一个字段（标签 + 负载）原样保存到 `sink`；开启丢弃标志时仅跳过。
    pub fn capture_unknown_field(&mut self, sink: &mut UnknownFields) -> Result<()> {
        if self.discard_unknown_fields {
            return self.skip_last_field();
        }
        let tag = self.last_tag;
        let payload_start = self.position;
        self.skip_last_field()?;
        sink.push_field(tag, &self.buffer[payload_start..self.position]);
        Ok(())
    }

    /// 一个打包块内、固定宽度元素是否能按 `len / width` 预分配容量。
    pub(crate) fn packed_capacity_hint(&self, len: usize, width: usize) -> Option<usize> {
        if width == 0 || len % width != 0 || len > self.remaining() {
            return None;
        }
        Some(len / width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tag_returns_zero_at_end() {
        let mut ctx = ReaderContext::new(&[]);
        assert_eq!(ctx.read_tag().expect("空输入"), 0);
    }

    #[test]
    fn literal_zero_tag_is_invalid() {
        let mut ctx = ReaderContext::new(&[0x00, 0x01]);
        assert!(matches!(ctx.read_tag(), Err(ProtoError::InvalidTag(0))));
    }

    #[test]
    fn negative_int32_accepts_ten_byte_form() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut ctx = ReaderContext::new(&bytes);
        assert_eq!(ctx.read_int32().expect("合法 -1"), -1);
        assert!(ctx.is_at_end());
    }

    #[test]
    fn strict_uint32_rejects_overlong() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut ctx = ReaderContext::new(&bytes);
        assert!(matches!(ctx.read_uint32(), Err(ProtoError::MalformedVarint)));
    }

    #[test]
    fn push_limit_bounds_reads() {
        // field 1 length-delimited "ab", followed by a stray byte.
        let bytes = [0x0A, 0x02, b'a', b'b', 0x08];
        let mut ctx = ReaderContext::new(&bytes);
        assert_eq!(ctx.read_tag().expect("tag"), 0x0A);
        let value = ctx
            .read_length_delimited(|inner| {
                let a = inner.read_raw_bytes(2)?.to_vec();
                assert_eq!(inner.read_tag()?, 0);
                Ok(a)
            })
            .expect("区域读取");
        assert_eq!(value, b"ab");
        assert_eq!(ctx.position(), 4);
    }

    #[test]
    fn push_limit_past_buffer_is_truncated() {
        let bytes = [0x0A, 0x05, b'a'];
        let mut ctx = ReaderContext::new(&bytes);
        ctx.read_tag().expect("tag");
        let result = ctx.read_length_delimited(|inner| inner.read_raw_bytes(1).map(<[u8]>::to_vec));
        assert!(matches!(result, Err(ProtoError::TruncatedMessage)));
    }

    #[test]
    fn skip_handles_every_wire_type() {
        let bytes = [
            0x08, 0x96, 0x01, // field 1 varint 150
            0x11, 1, 2, 3, 4, 5, 6, 7, 8, // field 2 fixed64
            0x1A, 0x01, 0xFF, // field 3 length-delimited
            0x25, 1, 2, 3, 4, // field 4 fixed32
            0x2B, 0x08, 0x01, 0x2C, // field 5 group { field 1 = 1 }
            0x30, 0x07, // field 6 varint 7
        ];
        let mut ctx = ReaderContext::new(&bytes);
        for _ in 0..5 {
            assert_ne!(ctx.read_tag().expect("tag"), 0);
            ctx.skip_last_field().expect("跳过");
        }
        assert_eq!(ctx.read_tag().expect("tag"), 0x30);
        assert_eq!(ctx.read_uint32().expect("value"), 7);
        assert_eq!(ctx.read_tag().expect("end"), 0);
    }

    #[test]
    fn unterminated_group_is_truncated() {
        let bytes = [0x0B, 0x08, 0x01];
        let mut ctx = ReaderContext::new(&bytes);
        ctx.read_tag().expect("tag");
        assert!(matches!(ctx.skip_last_field(), Err(ProtoError::TruncatedMessage)));
    }

    #[test]
    fn nested_messages_hit_recursion_limit() {
        let options = CodecOptions::default().with_recursion_limit(2);
        // three nested empty-ish length-delimited regions.
        let bytes = [0x02, 0x01, 0x00];
        let mut ctx = ReaderContext::with_options(&bytes, &options).expect("ctx");
        let result = ctx.read_message(|a| a.read_message(|b| b.read_message(|_| Ok(()))));
        assert!(matches!(result, Err(ProtoError::RecursionLimitExceeded { limit: 2 })));
    }

    #[test]
    fn size_limit_is_checked_up_front() {
        let options = CodecOptions::default().with_size_limit(2);
        let err = ReaderContext::with_options(&[1, 2, 3], &options).expect_err("超限");
        assert!(matches!(err, ProtoError::SizeLimitExceeded { size: 3, limit: 2 }));
    }

    #[test]
    fn capture_preserves_raw_field() {
        let bytes = [0x10, 0x2A];
        let mut ctx = ReaderContext::new(&bytes);
        ctx.read_tag().expect("tag");
        let mut unknown = UnknownFields::default();
        ctx.capture_unknown_field(&mut unknown).expect("capture");
        assert_eq!(unknown.as_bytes(), &bytes);
    }

    #[test]
    fn maybe_consume_tag_peeks_without_moving_on_mismatch() {
        let bytes = [0x08, 0x01, 0x10, 0x02];
        let mut ctx = ReaderContext::new(&bytes);
        ctx.read_tag().expect("tag");
        ctx.read_uint32().expect("value");
        assert!(!ctx.maybe_consume_tag(0x08).expect("peek"));
        assert_eq!(ctx.position(), 2);
        assert!(ctx.maybe_consume_tag(0x10).expect("consume"));
        assert_eq!(ctx.last_tag(), 0x10);
    }
}
