//! 透明适配器：`Option<T>` 与 `Box<T>`。
//!
//! 二者在线上都与内层类型完全同构。`None` 不写出任何字节，读取到字段即为 `Some`；
//! 作为根值时空输入解码为 `None`。`Box<T>` 仅改变内存布局，编解码全部委托给内层。
//!
//! 可打包性同样透传：`Vec<Option<i32>>` 与 `Vec<i32>` 读写同一打包块。重复字段里的 `None`
//! 没有线上表示，写入时以 [`ProtoError::AbsentElement`](crate::ProtoError) 拒绝。

use std::sync::Arc;

use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::{WireType, tag_wire_type};
use crate::writer::WriterContext;

/// `Option<T>` 解码器。
pub struct OptionalReader<T> {
    inner: Arc<dyn ProtoReader<T>>,
}

impl<T> OptionalReader<T> {
    /// 以内层解码器构造。
    pub fn new(inner: Arc<dyn ProtoReader<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoReader<Option<T>> for OptionalReader<T> {
    fn wire_type(&self) -> WireType {
        self.inner.wire_type()
    }

    fn is_message(&self) -> bool {
        self.inner.is_message()
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Option<T>> {
        self.inner.parse_from(ctx).map(Some)
    }

    fn default_value(&self) -> Option<Option<T>> {
        Some(None)
    }

    fn packable(&self) -> bool {
        self.inner.packable()
    }

    fn fixed_size(&self) -> usize {
        self.inner.fixed_size()
    }

    fn item_wire_type(&self) -> Option<WireType> {
        self.inner.item_wire_type()
    }

    fn parse_message_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Option<T>> {
        self.inner.parse_message_from(ctx).map(Some)
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut Option<T>) -> Result<()> {
        if let Some(existing) = slot.as_mut() {
            return self.inner.merge_field(ctx, existing);
        }
        if !self.inner.is_collection() && tag_wire_type(ctx.last_tag())? != self.inner.wire_type() {
            return ctx.skip_last_field();
        }
        let mut fresh = None;
        crate::codec::merge_into_option(self.inner.as_ref(), ctx, &mut fresh)?;
        *slot = fresh;
        Ok(())
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<Option<T>> {
        if ctx.is_at_end() {
            return Ok(None);
        }
        self.inner.parse_root(ctx).map(Some)
    }
}

/// `Option<T>` 编码器。
pub struct OptionalWriter<T> {
    inner: Arc<dyn ProtoWriter<T>>,
}

impl<T> OptionalWriter<T> {
    /// 以内层编码器构造。
    pub fn new(inner: Arc<dyn ProtoWriter<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoWriter<Option<T>> for OptionalWriter<T> {
    fn wire_type(&self) -> WireType {
        self.inner.wire_type()
    }

    fn is_message(&self) -> bool {
        self.inner.is_message()
    }

    fn is_collection(&self) -> bool {
        self.inner.is_collection()
    }

    fn packable(&self) -> bool {
        self.inner.packable()
    }

    fn fixed_size(&self) -> usize {
        self.inner.fixed_size()
    }

    fn nullable(&self) -> bool {
        true
    }

    fn is_absent(&self, value: &Option<T>) -> bool {
        value.as_ref().is_none_or(|inner| self.inner.is_absent(inner))
    }

    fn calculate_size(&self, value: &Option<T>) -> usize {
        value.as_ref().map_or(0, |inner| self.inner.calculate_size(inner))
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &Option<T>) -> Result<()> {
        match value {
            Some(inner) => self.inner.write_to(ctx, inner),
            None => Ok(()),
        }
    }

    fn should_write(&self, value: &Option<T>) -> bool {
        value.is_some()
    }

    fn calculate_message_size(&self, value: &Option<T>) -> usize {
        value
            .as_ref()
            .map_or(0, |inner| self.inner.calculate_message_size(inner))
    }

    fn write_message_to(&self, ctx: &mut WriterContext<'_>, value: &Option<T>) -> Result<()> {
        match value {
            Some(inner) => self.inner.write_message_to(ctx, inner),
            None => Ok(()),
        }
    }

    fn calculate_field_size(&self, field_number: u32, value: &Option<T>) -> usize {
        value
            .as_ref()
            .map_or(0, |inner| self.inner.calculate_field_size(field_number, inner))
    }

    fn write_field(
        &self,
        ctx: &mut WriterContext<'_>,
        field_number: u32,
        value: &Option<T>,
    ) -> Result<()> {
        match value {
            Some(inner) => self.inner.write_field(ctx, field_number, inner),
            None => Ok(()),
        }
    }
}

/// `Box<T>` 解码器。
pub struct BoxReader<T> {
    inner: Arc<dyn ProtoReader<T>>,
}

impl<T> BoxReader<T> {
    /// 以内层解码器构造。
    pub fn new(inner: Arc<dyn ProtoReader<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoReader<Box<T>> for BoxReader<T> {
    fn wire_type(&self) -> WireType {
        self.inner.wire_type()
    }

    fn is_message(&self) -> bool {
        self.inner.is_message()
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Box<T>> {
        self.inner.parse_from(ctx).map(Box::new)
    }

    fn default_value(&self) -> Option<Box<T>> {
        self.inner.default_value().map(Box::new)
    }

    fn packable(&self) -> bool {
        self.inner.packable()
    }

    fn fixed_size(&self) -> usize {
        self.inner.fixed_size()
    }

    fn item_wire_type(&self) -> Option<WireType> {
        self.inner.item_wire_type()
    }

    fn parse_message_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Box<T>> {
        self.inner.parse_message_from(ctx).map(Box::new)
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut Box<T>) -> Result<()> {
        self.inner.merge_field(ctx, slot.as_mut())
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<Box<T>> {
        self.inner.parse_root(ctx).map(Box::new)
    }
}

/// `Box<T>` 编码器。
pub struct BoxWriter<T> {
    inner: Arc<dyn ProtoWriter<T>>,
}

impl<T> BoxWriter<T> {
    /// 以内层编码器构造。
    pub fn new(inner: Arc<dyn ProtoWriter<T>>) -> Self {
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> ProtoWriter<Box<T>> for BoxWriter<T> {
    fn wire_type(&self) -> WireType {
        self.inner.wire_type()
    }

    fn is_message(&self) -> bool {
        self.inner.is_message()
    }

    fn is_collection(&self) -> bool {
        self.inner.is_collection()
    }

    fn packable(&self) -> bool {
        self.inner.packable()
    }

    fn fixed_size(&self) -> usize {
        self.inner.fixed_size()
    }

    fn nullable(&self) -> bool {
        self.inner.nullable()
    }

    fn is_absent(&self, value: &Box<T>) -> bool {
        self.inner.is_absent(value)
    }

    fn calculate_size(&self, value: &Box<T>) -> usize {
        self.inner.calculate_size(value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &Box<T>) -> Result<()> {
        self.inner.write_to(ctx, value)
    }

    fn should_write(&self, value: &Box<T>) -> bool {
        self.inner.should_write(value)
    }

    fn calculate_message_size(&self, value: &Box<T>) -> usize {
        self.inner.calculate_message_size(value)
    }

    fn write_message_to(&self, ctx: &mut WriterContext<'_>, value: &Box<T>) -> Result<()> {
        self.inner.write_message_to(ctx, value)
    }

    fn calculate_field_size(&self, field_number: u32, value: &Box<T>) -> usize {
        self.inner.calculate_field_size(field_number, value)
    }

    fn write_field(&self, ctx: &mut WriterContext<'_>, field_number: u32, value: &Box<T>) -> Result<()> {
        self.inner.write_field(ctx, field_number, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::repeated::{RepeatedReader, RepeatedWriter};
    use crate::codec::scalar::{Int32Codec, StringCodec};
    use crate::codec::wrapper::{wrap_reader, wrap_writer};
    use crate::error::ProtoError;

    fn decode_field<T: 'static>(reader: &dyn ProtoReader<T>, slot: &mut T, bytes: &[u8]) {
        let mut ctx = ReaderContext::new(bytes);
        while ctx.read_tag().expect("tag") != 0 {
            reader.merge_field(&mut ctx, slot).expect("合并");
        }
    }

    #[test]
    fn none_writes_nothing() {
        let writer = OptionalWriter::<i32>::new(Arc::new(Int32Codec));
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        writer.write_field(&mut ctx, 3, &None).expect("编码");
        assert!(out.is_empty());
        assert_eq!(writer.calculate_field_size(3, &None), 0);
    }

    #[test]
    fn present_value_matches_inner_encoding() {
        let writer = OptionalWriter::<String>::new(Arc::new(StringCodec));
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        writer
            .write_field(&mut ctx, 1, &Some("hi".to_string()))
            .expect("编码");
        assert_eq!(out, vec![0x0A, 0x02, b'h', b'i']);
    }

    #[test]
    fn root_none_round_trips_through_wrapper() {
        let writer = wrap_writer::<Option<i32>>(Arc::new(OptionalWriter::<i32>::new(Arc::new(Int32Codec))));
        let reader = wrap_reader::<Option<i32>>(Arc::new(OptionalReader::<i32>::new(Arc::new(Int32Codec))));
        for value in [None, Some(0), Some(-7)] {
            let mut out = Vec::new();
            let mut ctx = WriterContext::new(&mut out);
            writer.write_to(&mut ctx, &value).expect("编码");
            let mut input = ReaderContext::new(&out);
            assert_eq!(reader.parse_from(&mut input).expect("解码"), value);
        }
    }

    #[test]
    fn boxed_value_is_transparent() {
        let writer = BoxWriter::<i32>::new(Arc::new(Int32Codec));
        let reader = BoxReader::<i32>::new(Arc::new(Int32Codec));
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        writer.write_field(&mut ctx, 1, &Box::new(150)).expect("编码");
        assert_eq!(out, vec![0x08, 0x96, 0x01]);
        let mut input = ReaderContext::new(&out);
        input.read_tag().expect("tag");
        assert_eq!(*reader.read_field(&mut input).expect("解码"), 150);
    }

    #[test]
    fn packed_block_fills_optional_and_boxed_sequences() {
        let packed = [0x0A, 0x03, 0x01, 0x02, 0x03];

        let optional = RepeatedReader::<Vec<Option<i32>>>::new(Arc::new(OptionalReader::<i32>::new(
            Arc::new(Int32Codec),
        )));
        let mut values: Vec<Option<i32>> = Vec::new();
        decode_field(&optional, &mut values, &packed);
        assert_eq!(values, vec![Some(1), Some(2), Some(3)]);

        let boxed = RepeatedReader::<Vec<Box<i32>>>::new(Arc::new(BoxReader::<i32>::new(Arc::new(
            Int32Codec,
        ))));
        let mut values: Vec<Box<i32>> = Vec::new();
        decode_field(&boxed, &mut values, &packed);
        assert_eq!(values, vec![Box::new(1), Box::new(2), Box::new(3)]);
    }

    #[test]
    fn present_optional_elements_pack_like_plain_ones() {
        let optional = RepeatedWriter::<Vec<Option<i32>>>::new(Arc::new(OptionalWriter::<i32>::new(
            Arc::new(Int32Codec),
        )));
        let plain = RepeatedWriter::<Vec<i32>>::new(Arc::new(Int32Codec));
        assert!(optional.is_packed());

        let mut from_optional = Vec::new();
        let mut ctx = WriterContext::new(&mut from_optional);
        optional
            .write_field(&mut ctx, 1, &vec![Some(1), Some(2), Some(3)])
            .expect("编码");
        let mut from_plain = Vec::new();
        let mut ctx = WriterContext::new(&mut from_plain);
        plain.write_field(&mut ctx, 1, &vec![1, 2, 3]).expect("编码");

        assert_eq!(from_optional, vec![0x0A, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(from_optional, from_plain);
        assert_eq!(
            optional.calculate_field_size(1, &vec![Some(1), Some(2), Some(3)]),
            from_optional.len()
        );
    }

    #[test]
    fn absent_elements_are_rejected_before_any_byte() {
        let values = vec![Some(1), None, Some(3)];
        let packed = RepeatedWriter::<Vec<Option<i32>>>::new(Arc::new(OptionalWriter::<i32>::new(
            Arc::new(Int32Codec),
        )));
        let unpacked = RepeatedWriter::<Vec<Option<i32>>>::unpacked(Arc::new(
            OptionalWriter::<i32>::new(Arc::new(Int32Codec)),
        ));
        for writer in [&packed, &unpacked] {
            let mut out = Vec::new();
            let mut ctx = WriterContext::new(&mut out);
            let err = writer.write_field(&mut ctx, 1, &values).expect_err("None 元素应被拒绝");
            assert!(matches!(err, ProtoError::AbsentElement { index: 1, .. }));
            assert!(out.is_empty());
        }

        let boxed = RepeatedWriter::<Vec<Box<Option<String>>>>::new(Arc::new(BoxWriter::<Option<String>>::new(
            Arc::new(OptionalWriter::<String>::new(Arc::new(StringCodec))),
        )));
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        let err = boxed
            .write_field(&mut ctx, 2, &vec![Box::new(None)])
            .expect_err("装箱的 None 同样被拒绝");
        assert_eq!(err.code(), crate::error::codes::ABSENT_ELEMENT);
    }
}
