//! 未知字段的原样保留。
//!
//! 消息解码时遇到自身未声明的字段号，可选择跳过，或者把"标签 + 负载"原样存入 [`UnknownFields`]，
//! 重新编码时追加回输出，实现与新版本生产者之间的无损转发。

use crate::error::Result;
use crate::wire::{self, MAX_VARINT64_BYTES};
use crate::writer::WriterContext;

/// 以线格式字节保存的未知字段集合。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnknownFields {
    raw: Vec<u8>,
}

impl UnknownFields {
    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// 追加一个字段：`tag` 与其后紧跟的原始负载。
    pub fn push_field(&mut self, tag: u32, payload: &[u8]) {
        let mut scratch = [0u8; MAX_VARINT64_BYTES];
        let len = wire::encode_varint64(u64::from(tag), &mut scratch);
        self.raw.extend_from_slice(&scratch[..len]);
        self.raw.extend_from_slice(payload);
    }

    /// 线格式字节视图。
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// 编码尺寸。
    pub fn calculate_size(&self) -> usize {
        self.raw.len()
    }

    /// 把保存的字段原样写回。
    pub fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        ctx.write_raw_bytes(&self.raw)
    }

    /// 清空。
    pub fn clear(&mut self) {
        self.raw.clear();
    }
}
