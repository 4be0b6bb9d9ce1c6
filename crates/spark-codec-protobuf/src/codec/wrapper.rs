//! 字段 1 包装消息。
//!
//! # 教案式说明
//! - **意图 (Why)**：分帧层要求每个条目在结构上都是消息；裸标量、枚举、集合作为根值时，
//!   需要合成一个只含字段 1 的长度界定信封，才能与消息一样做长度前缀；
//! - **契约 (What)**：
//!   - 写：信封体 = `inner.write_field(ctx, 1, value)`，集合会把自身直接写在字段 1 下，不会二次包裹；
//!   - 读：合并所有字段 1 的出现（集合追加、标量后写覆盖），其余字段号按未知字段跳过；
//!     字段 1 缺席时回落到内层默认值；
//! - **风险 (Trade-offs)**：信封在线上与 `message Wrapper { T value = 1; }` 完全同构，
//!   因此可与其它 protobuf 实现互通。

use std::sync::Arc;

use crate::codec::{ProtoReader, ProtoWriter, finish_slot, merge_into_option};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::{WireType, tag_field_number};
use crate::writer::WriterContext;

/// 包装消息使用的字段号。
pub const WRAPPED_FIELD_NUMBER: u32 = 1;

/// 读取当前区域内的字段 1，跳过其它字段。
///
/// 集合根值与包装消息共用这一逻辑。
pub(crate) fn read_wrapped_field<T: 'static>(
    reader: &dyn ProtoReader<T>,
    ctx: &mut ReaderContext<'_>,
) -> Result<T> {
    let mut slot = None;
    loop {
        let tag = ctx.read_tag()?;
        if tag == 0 {
            break;
        }
        if tag_field_number(tag) == WRAPPED_FIELD_NUMBER {
            merge_into_option(reader, ctx, &mut slot)?;
        } else {
            ctx.skip_last_field()?;
        }
    }
    finish_slot(reader, slot, WRAPPED_FIELD_NUMBER)
}

/// 包装消息解码器。
pub struct MessageWrapperReader<T> {
    inner: Arc<dyn ProtoReader<T>>,
}

impl<T> MessageWrapperReader<T> {
    /// 包装内层解码器。
    pub fn new(inner: Arc<dyn ProtoReader<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoReader<T> for MessageWrapperReader<T> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<T> {
        read_wrapped_field(self.inner.as_ref(), ctx)
    }

    fn default_value(&self) -> Option<T> {
        self.inner.default_value()
    }
}

/// 包装消息编码器。
pub struct MessageWrapperWriter<T> {
    inner: Arc<dyn ProtoWriter<T>>,
}

impl<T> MessageWrapperWriter<T> {
    /// 包装内层编码器。
    pub fn new(inner: Arc<dyn ProtoWriter<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoWriter<T> for MessageWrapperWriter<T> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &T) -> usize {
        self.inner.calculate_field_size(WRAPPED_FIELD_NUMBER, value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &T) -> Result<()> {
        self.inner.write_field(ctx, WRAPPED_FIELD_NUMBER, value)
    }
}

/// 非消息编码器包装为消息；已是消息的原样返回。
pub fn wrap_writer<T: Send + Sync + 'static>(
    writer: Arc<dyn ProtoWriter<T>>,
) -> Arc<dyn ProtoWriter<T>> {
    if writer.is_message() {
        writer
    } else {
        Arc::new(MessageWrapperWriter::new(writer))
    }
}

/// 非消息解码器包装为消息；已是消息的原样返回。
pub fn wrap_reader<T: Send + Sync + 'static>(
    reader: Arc<dyn ProtoReader<T>>,
) -> Arc<dyn ProtoReader<T>> {
    if reader.is_message() {
        reader
    } else {
        Arc::new(MessageWrapperReader::new(reader))
    }
}
