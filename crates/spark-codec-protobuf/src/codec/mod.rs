//! 类型编解码契约与内建编解码器。
//!
//! # 教案式说明
//! - **意图 (Why)**：每个具体类型恰好绑定一对 `(wire_type, is_message)` 事实与一对读写函数；
//!   集合、映射、可选值等泛型适配器都通过这两个 trait 递归调用元素编解码器；
//! - **契约 (What)**：
//!   - [`ProtoReader::parse_from`]/[`ProtoWriter::write_to`] 只处理负载本体，消息不含长度前缀；
//!   - `*_message_*` 系列在 `is_message` 为真时补上长度前缀、限界与递归守卫；
//!   - `*_field` 系列再补上标签；集合类型覆写这两个入口，自行管理标签，绝不被二次包裹；
//!   - [`ProtoWriter::calculate_size`] 必须与 [`ProtoWriter::write_to`] 写出的字节数严格一致；
//! - **执行逻辑 (How)**：编解码器以 `Arc<dyn ProtoReader<T>>` 形式缓存于注册表，或由调用方显式持有；
//!   它们都是不可变、无状态的，可在线程间自由共享。

pub mod enumeration;
pub mod map;
pub mod message;
pub mod optional;
pub mod repeated;
pub mod scalar;
pub mod surrogate;
pub mod wrapper;

use crate::error::{ProtoError, Result};
use crate::reader::ReaderContext;
use crate::wire::{WireType, length_size, tag_size, tag_wire_type};
use crate::writer::WriterContext;

/// 解码契约。
pub trait ProtoReader<T>: Send + Sync + 'static {
    /// 该类型作为字段时标签携带的线类型。
    fn wire_type(&self) -> WireType;

    /// 是否为自带长度前缀的结构化消息。
    fn is_message(&self) -> bool {
        false
    }

    /// 解析负载本体。消息类型读取至当前限界末尾。
    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<T>;

    /// 字段缺席时使用的值；没有合理默认值的类型返回 `None`。
    fn default_value(&self) -> Option<T> {
        None
    }

    /// 元素是否可参与打包编码。
    fn packable(&self) -> bool {
        false
    }

    /// 定宽负载的字节数，非定宽返回 0。
    fn fixed_size(&self) -> usize {
        0
    }

    /// 集合类型返回元素的线类型；非集合返回 `None`。
    fn item_wire_type(&self) -> Option<WireType> {
        None
    }

    /// 是否为自行管理标签的集合编解码器。
    fn is_collection(&self) -> bool {
        self.item_wire_type().is_some()
    }

    /// 解析可能带长度前缀的负载：消息类型进入嵌套区域并计入递归深度。
    fn parse_message_from(&self, ctx: &mut ReaderContext<'_>) -> Result<T> {
        if self.is_message() {
            ctx.read_message(|inner| self.parse_from(inner))
        } else {
            self.parse_from(ctx)
        }
    }

    /// 在标签已被读取后解析字段值。
    fn read_field(&self, ctx: &mut ReaderContext<'_>) -> Result<T> {
        self.parse_message_from(ctx)
    }

    /// 把刚读到标签的字段合并进 `slot`。
    ///
    /// 线类型与本编解码器不符时按未知字段跳过，`slot` 保持不变；否则新值覆盖旧值。
    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut T) -> Result<()> {
        if tag_wire_type(ctx.last_tag())? != self.wire_type() {
            return ctx.skip_last_field();
        }
        *slot = self.read_field(ctx)?;
        Ok(())
    }

    /// 作为根值解析整段输入。
    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<T> {
        self.parse_from(ctx)
    }
}

/// 编码契约。
pub trait ProtoWriter<T>: Send + Sync + 'static {
    /// 该类型作为字段时标签携带的线类型。
    fn wire_type(&self) -> WireType;

    /// 是否为自带长度前缀的结构化消息。
    fn is_message(&self) -> bool {
        false
    }

    /// 是否为自行管理标签的集合编解码器。
    fn is_collection(&self) -> bool {
        false
    }

    /// 元素是否可参与打包编码。
    fn packable(&self) -> bool {
        false
    }

    /// 定宽负载的字节数，非定宽返回 0。
    fn fixed_size(&self) -> usize {
        0
    }

    /// 值是否可能缺席（可选值适配器）。重复字段据此决定是否逐个检查元素。
    fn nullable(&self) -> bool {
        false
    }

    /// `value` 是否为缺席值；缺席值作为字段不写出任何字节。
    fn is_absent(&self, _value: &T) -> bool {
        false
    }

    /// 负载本体尺寸，不含标签，消息不含长度前缀。
    fn calculate_size(&self, value: &T) -> usize;

    /// 写出负载本体。
    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &T) -> Result<()>;

    /// proto3 默认值省略提示：值等于类型默认值时返回 `false`。
    ///
    /// 编解码器自身从不据此跳过写入，由消息实现决定是否采纳。
    fn should_write(&self, _value: &T) -> bool {
        true
    }

    /// 含长度前缀（若为消息）的负载尺寸。
    fn calculate_message_size(&self, value: &T) -> usize {
        let size = self.calculate_size(value);
        if self.is_message() {
            length_size(size) + size
        } else {
            size
        }
    }

    /// 写出含长度前缀（若为消息）的负载。
    fn write_message_to(&self, ctx: &mut WriterContext<'_>, value: &T) -> Result<()> {
        if self.is_message() {
            ctx.write_length(self.calculate_size(value))?;
        }
        self.write_to(ctx, value)
    }

    /// 作为 `field_number` 字段写出时的总尺寸：标签 + 负载。
    fn calculate_field_size(&self, field_number: u32, value: &T) -> usize {
        tag_size(field_number) + self.calculate_message_size(value)
    }

    /// 以 `field_number` 写出标签与负载。
    fn write_field(&self, ctx: &mut WriterContext<'_>, field_number: u32, value: &T) -> Result<()> {
        ctx.write_field_tag(field_number, self.wire_type())?;
        self.write_message_to(ctx, value)
    }
}

/// 把字段合并进可选槽位：已有值时原地合并，否则从默认值起步。
///
/// 包装消息、映射条目等"字段可能缺席"的场景共用此逻辑，保证集合字段多次出现时按追加语义合并。
pub(crate) fn merge_into_option<T: 'static>(
    reader: &dyn ProtoReader<T>,
    ctx: &mut ReaderContext<'_>,
    slot: &mut Option<T>,
) -> Result<()> {
    if let Some(existing) = slot.as_mut() {
        return reader.merge_field(ctx, existing);
    }
    match reader.default_value() {
        Some(mut fresh) => {
            reader.merge_field(ctx, &mut fresh)?;
            *slot = Some(fresh);
        }
        None => {
            if tag_wire_type(ctx.last_tag())? != reader.wire_type() && !reader.is_collection() {
                return ctx.skip_last_field();
            }
            *slot = Some(reader.read_field(ctx)?);
        }
    }
    Ok(())
}

/// 取出可选槽位的最终值，缺席时回落到默认值。
pub(crate) fn finish_slot<T: 'static>(
    reader: &dyn ProtoReader<T>,
    slot: Option<T>,
    field_number: u32,
) -> Result<T> {
    match slot {
        Some(value) => Ok(value),
        None => reader.default_value().ok_or(ProtoError::MissingField {
            field_number,
            type_name: std::any::type_name::<T>(),
        }),
    }
}
