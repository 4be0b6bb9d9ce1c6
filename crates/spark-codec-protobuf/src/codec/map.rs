//! 映射与键值对编解码。
//!
//! # 教案式说明
//! - **意图 (Why)**：protobuf 的 `map<K, V>` 在线上就是重复的条目消息 `{ K key = 1; V value = 2; }`，
//!   任何键值容器都能以此与其它实现互通；
//! - **契约 (What)**：
//!   - 每个条目写作一个长度界定子消息；键、值即便等于默认值也照常写出；
//!   - 读条目时字段 1、2 之外的字段号按未知字段跳过；键或值缺席时回落到默认值，
//!     无默认值的类型返回 [`ProtoError::MissingField`](crate::ProtoError::MissingField)；
//!   - 同一键重复出现时后写覆盖；有序映射按键序写出，哈希映射按迭代顺序写出；
//! - **设计权衡 (Trade-offs)**：条目逻辑独立为 [`PairReader`]/[`PairWriter`]，
//!   使 `(K, V)` 元组本身也能作为消息单独编解码。

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::wrapper::read_wrapped_field;
use crate::codec::{ProtoReader, ProtoWriter, finish_slot, merge_into_option};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::{WireType, length_size, make_tag, tag_field_number, tag_size, tag_wire_type};
use crate::writer::WriterContext;

/// 条目消息中键的字段号。
pub const KEY_FIELD_NUMBER: u32 = 1;
/// 条目消息中值的字段号。
pub const VALUE_FIELD_NUMBER: u32 = 2;

/// 可作为 protobuf map 编解码的键值容器。
pub trait ProtoMap: Send + Sync + 'static {
    /// 键类型。
    type Key: Send + Sync + 'static;
    /// 值类型。
    type Value: Send + Sync + 'static;

    /// 条目迭代器。
    type Iter<'a>: Iterator<Item = (&'a Self::Key, &'a Self::Value)>
    where
        Self: 'a;

    /// 以容量提示创建空映射。
    fn with_capacity(capacity: usize) -> Self;

    /// 条目个数。
    fn entry_count(&self) -> usize;

    /// 插入或覆盖一个条目。
    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);

    /// 遍历全部条目。
    fn iter_entries(&self) -> Self::Iter<'_>;
}

impl<K, V> ProtoMap for HashMap<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Iter<'a> = std::collections::hash_map::Iter<'a, K, V>;

    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity(capacity)
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn iter_entries(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<K, V> ProtoMap for BTreeMap<K, V>
where
    K: Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Iter<'a> = std::collections::btree_map::Iter<'a, K, V>;

    fn with_capacity(_capacity: usize) -> Self {
        BTreeMap::new()
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn iter_entries(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

/// 键值对消息解码器。
pub struct PairReader<K, V> {
    key: Arc<dyn ProtoReader<K>>,
    value: Arc<dyn ProtoReader<V>>,
}

impl<K, V> PairReader<K, V> {
    /// 以键、值解码器构造。
    pub fn new(key: Arc<dyn ProtoReader<K>>, value: Arc<dyn ProtoReader<V>>) -> Self {
        Self { key, value }
    }
}

impl<K: Send + Sync + 'static, V: Send + Sync + 'static> ProtoReader<(K, V)> for PairReader<K, V> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<(K, V)> {
        let mut key = None;
        let mut value = None;
        loop {
            let tag = ctx.read_tag()?;
            if tag == 0 {
                break;
            }
            match tag_field_number(tag) {
                KEY_FIELD_NUMBER => merge_into_option(self.key.as_ref(), ctx, &mut key)?,
                VALUE_FIELD_NUMBER => merge_into_option(self.value.as_ref(), ctx, &mut value)?,
                _ => ctx.skip_last_field()?,
            }
        }
        Ok((
            finish_slot(self.key.as_ref(), key, KEY_FIELD_NUMBER)?,
            finish_slot(self.value.as_ref(), value, VALUE_FIELD_NUMBER)?,
        ))
    }

    fn default_value(&self) -> Option<(K, V)> {
        Some((self.key.default_value()?, self.value.default_value()?))
    }
}

/// 键值对消息编码器。
pub struct PairWriter<K, V> {
    key: Arc<dyn ProtoWriter<K>>,
    value: Arc<dyn ProtoWriter<V>>,
}

impl<K: 'static, V: 'static> PairWriter<K, V> {
    /// 以键、值编码器构造。
    pub fn new(key: Arc<dyn ProtoWriter<K>>, value: Arc<dyn ProtoWriter<V>>) -> Self {
        Self { key, value }
    }

    /// 条目消息体尺寸。
    pub fn entry_size(&self, key: &K, value: &V) -> usize {
        self.key.calculate_field_size(KEY_FIELD_NUMBER, key)
            + self.value.calculate_field_size(VALUE_FIELD_NUMBER, value)
    }

    /// 写出条目消息体。
    pub fn write_entry(&self, ctx: &mut WriterContext<'_>, key: &K, value: &V) -> Result<()> {
        self.key.write_field(ctx, KEY_FIELD_NUMBER, key)?;
        self.value.write_field(ctx, VALUE_FIELD_NUMBER, value)
    }
}

impl<K: Send + Sync + 'static, V: Send + Sync + 'static> ProtoWriter<(K, V)> for PairWriter<K, V> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &(K, V)) -> usize {
        self.entry_size(&value.0, &value.1)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &(K, V)) -> Result<()> {
        self.write_entry(ctx, &value.0, &value.1)
    }
}

/// 映射解码器。
pub struct MapReader<M: ProtoMap> {
    entry: PairReader<M::Key, M::Value>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: ProtoMap> MapReader<M> {
    /// 以键、值解码器构造。
    pub fn new(key: Arc<dyn ProtoReader<M::Key>>, value: Arc<dyn ProtoReader<M::Value>>) -> Self {
        Self {
            entry: PairReader::new(key, value),
            _marker: PhantomData,
        }
    }

    fn fill(&self, ctx: &mut ReaderContext<'_>, target: &mut M) -> Result<()> {
        let tag = ctx.last_tag();
        if tag_wire_type(tag)? != WireType::LengthDelimited {
            return ctx.skip_last_field();
        }
        loop {
            let (key, value) = self.entry.parse_message_from(ctx)?;
            target.insert_entry(key, value);
            if !ctx.maybe_consume_tag(tag)? {
                return Ok(());
            }
        }
    }
}

impl<M: ProtoMap> ProtoReader<M> for MapReader<M> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<M> {
        let mut target = M::with_capacity(0);
        self.fill(ctx, &mut target)?;
        Ok(target)
    }

    fn default_value(&self) -> Option<M> {
        Some(M::with_capacity(0))
    }

    fn item_wire_type(&self) -> Option<WireType> {
        Some(WireType::LengthDelimited)
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut M) -> Result<()> {
        self.fill(ctx, slot)
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<M> {
        read_wrapped_field(self, ctx)
    }
}

/// 映射编码器。
pub struct MapWriter<M: ProtoMap> {
    entry: PairWriter<M::Key, M::Value>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: ProtoMap> MapWriter<M> {
    /// 以键、值编码器构造。
    pub fn new(key: Arc<dyn ProtoWriter<M::Key>>, value: Arc<dyn ProtoWriter<M::Value>>) -> Self {
        Self {
            entry: PairWriter::new(key, value),
            _marker: PhantomData,
        }
    }
}

impl<M: ProtoMap> ProtoWriter<M> for MapWriter<M> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &M) -> usize {
        self.calculate_field_size(1, value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &M) -> Result<()> {
        self.write_field(ctx, 1, value)
    }

    fn should_write(&self, value: &M) -> bool {
        value.entry_count() > 0
    }

    fn calculate_field_size(&self, field_number: u32, value: &M) -> usize {
        let tag = tag_size(field_number);
        value
            .iter_entries()
            .map(|(k, v)| {
                let body = self.entry.entry_size(k, v);
                tag + length_size(body) + body
            })
            .sum()
    }

    fn write_field(&self, ctx: &mut WriterContext<'_>, field_number: u32, value: &M) -> Result<()> {
        let tag = make_tag(field_number, WireType::LengthDelimited);
        for (k, v) in value.iter_entries() {
            ctx.write_tag(tag)?;
            ctx.write_length(self.entry.entry_size(k, v))?;
            self.entry.write_entry(ctx, k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::repeated::{RepeatedReader, RepeatedWriter};
    use crate::codec::scalar::{Int32Codec, StringCodec};
    use crate::error::ProtoError;

    fn string_int_writer() -> MapWriter<BTreeMap<String, i32>> {
        MapWriter::new(Arc::new(StringCodec), Arc::new(Int32Codec))
    }

    fn string_int_reader<M: ProtoMap<Key = String, Value = i32>>() -> MapReader<M> {
        MapReader::new(Arc::new(StringCodec), Arc::new(Int32Codec))
    }

    fn decode_field<M: ProtoMap>(reader: &MapReader<M>, bytes: &[u8]) -> M {
        let mut ctx = ReaderContext::new(bytes);
        let mut target = M::with_capacity(0);
        while ctx.read_tag().expect("tag") != 0 {
            reader.merge_field(&mut ctx, &mut target).expect("合并");
        }
        target
    }

    #[test]
    fn entries_follow_key_order_and_keep_defaults() {
        let map = BTreeMap::from([("b".to_string(), 0), ("a".to_string(), 1)]);
        let writer = string_int_writer();
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        writer.write_field(&mut ctx, 1, &map).expect("编码");
        assert_eq!(
            out,
            vec![
                0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01, //
                0x0A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x00,
            ]
        );
        assert_eq!(writer.calculate_field_size(1, &map), out.len());
        assert_eq!(decode_field(&string_int_reader::<BTreeMap<_, _>>(), &out), map);
    }

    #[test]
    fn missing_key_and_value_use_defaults() {
        let bytes = [0x0A, 0x00, 0x0A, 0x02, 0x10, 0x05];
        let decoded: HashMap<String, i32> = decode_field(&string_int_reader(), &bytes);
        // the second entry overwrites the first because both keys default to "".
        assert_eq!(decoded, HashMap::from([(String::new(), 5)]));
    }

    #[test]
    fn unknown_entry_fields_are_skipped() {
        let bytes = [0x0A, 0x07, 0x0A, 0x01, b'k', 0x18, 0x09, 0x10, 0x02];
        let decoded: HashMap<String, i32> = decode_field(&string_int_reader(), &bytes);
        assert_eq!(decoded.get("k"), Some(&2));
    }

    #[test]
    fn missing_value_without_default_is_an_error() {
        struct Strict;
        impl ProtoReader<u32> for Strict {
            fn wire_type(&self) -> WireType {
                WireType::Varint
            }
            fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<u32> {
                ctx.read_uint32()
            }
        }
        let reader = MapReader::<HashMap<String, u32>>::new(Arc::new(StringCodec), Arc::new(Strict));
        let bytes = [0x0A, 0x03, 0x0A, 0x01, b'k'];
        let mut ctx = ReaderContext::new(&bytes);
        ctx.read_tag().expect("tag");
        let err = reader.read_field(&mut ctx).expect_err("缺少值");
        assert!(matches!(err, ProtoError::MissingField { field_number: 2, .. }));
    }

    #[test]
    fn collection_values_write_under_the_value_field() {
        let writer = MapWriter::<BTreeMap<i32, Vec<i32>>>::new(
            Arc::new(Int32Codec),
            Arc::new(RepeatedWriter::<Vec<i32>>::new(Arc::new(Int32Codec))),
        );
        let reader = MapReader::<BTreeMap<i32, Vec<i32>>>::new(
            Arc::new(Int32Codec),
            Arc::new(RepeatedReader::<Vec<i32>>::new(Arc::new(Int32Codec))),
        );
        let map = BTreeMap::from([(1, vec![4, 5]), (2, Vec::new())]);
        let mut out = Vec::new();
        let mut ctx = WriterContext::new(&mut out);
        writer.write_field(&mut ctx, 3, &map).expect("编码");
        assert_eq!(&out[..8], &[0x1A, 0x06, 0x08, 0x01, 0x12, 0x02, 0x04, 0x05]);
        assert_eq!(decode_field(&reader, &out), map);
    }
}
