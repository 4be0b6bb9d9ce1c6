//! 结构化消息契约。
//!
//! # 教案式说明
//! - **意图 (Why)**：不依赖 schema 编译器，由类型自身声明字段布局；这就是动态解析器里的"自描述类型"；
//! - **契约 (What)**：
//!   - [`ProtoMessage::calculate_size`] 与 [`ProtoMessage::write_to`] 针对消息体，不含长度前缀；
//!   - [`ProtoMessage::merge_field`] 在标签已读出后被调用，未识别的字段号应交给
//!     [`ReaderContext::skip_last_field`] 或 [`ReaderContext::capture_unknown_field`]；
//!   - 字段建议统一经由元素编解码器的 `merge_field` 读取：标量后写覆盖，重复字段追加；
//! - **执行逻辑 (How)**：[`MessageCodec`] 把消息适配为 `ProtoReader`/`ProtoWriter`，
//!   读取循环直到 `read_tag` 返回 0（当前区域末尾）。

use std::marker::PhantomData;

use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::WireType;
use crate::writer::WriterContext;

/// 字段名与字段号的静态描述，供协作方按成员名定位字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// 成员名。
    pub name: &'static str,
    /// 字段号。
    pub number: u32,
}

impl FieldDescriptor {
    /// 构造描述符。
    pub const fn new(name: &'static str, number: u32) -> Self {
        Self { name, number }
    }
}

/// 自描述的结构化消息。
pub trait ProtoMessage: Default + Send + Sync + 'static {
    /// 成员名到字段号的映射表；不参与编解码，只服务于字段选择器。
    const FIELDS: &'static [FieldDescriptor] = &[];

    /// 消息体尺寸。
    fn calculate_size(&self) -> usize;

    /// 写出消息体。
    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()>;

    /// 合并一个刚读出标签的字段。
    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()>;
}

/// 把 [`ProtoMessage`] 适配为类型编解码器。
pub struct MessageCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> MessageCodec<M> {
    /// 构造编解码器。
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for MessageCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for MessageCodec<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MessageCodec<M> {}

impl<M> std::fmt::Debug for MessageCodec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("message", &std::any::type_name::<M>())
            .finish()
    }
}

impl<M: ProtoMessage> ProtoReader<M> for MessageCodec<M> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<M> {
        let mut message = M::default();
        self.merge_from(ctx, &mut message)?;
        Ok(message)
    }

    fn default_value(&self) -> Option<M> {
        Some(M::default())
    }
}

impl<M: ProtoMessage> MessageCodec<M> {
    /// 把当前区域内的全部字段合并进已有消息。
    pub fn merge_from(&self, ctx: &mut ReaderContext<'_>, message: &mut M) -> Result<()> {
        loop {
            let tag = ctx.read_tag()?;
            if tag == 0 {
                return Ok(());
            }
            message.merge_field(ctx, tag)?;
        }
    }
}

impl<M: ProtoMessage> ProtoWriter<M> for MessageCodec<M> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &M) -> usize {
        value.calculate_size()
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &M) -> Result<()> {
        value.write_to(ctx)
    }
}
