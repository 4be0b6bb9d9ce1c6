//! 重复字段编解码。
//!
//! # 教案式说明
//! - **意图 (Why)**：任意"可追加的元素序列"都应能作为重复字段读写，且对可打包元素默认使用打包编码；
//! - **契约 (What)**：
//!   - 写：可打包元素输出一个标签、一个总长度、随后紧密排列的元素负载；其它元素每个都带完整标签；
//!   - 读：长度界定标签 + 可打包元素按打包块解析；与元素线类型一致的标签按逐个出现解析，
//!     直到下一个标签不同；两种编码都接受；
//!   - 打包块总长能被元素定宽整除且数据确实可用时，先按 `len / width` 预留容量；
//!   - 有序容器保持线上顺序；[`ShapeConstructor::ReversedSequence`](crate::ShapeConstructor) 对应的栈容器
//!     在顺序追加后整体反转，使出栈顺序与原始一致；
//!   - 同一字段多次出现时追加合并；
//!   - 元素可能缺席（`Option<T>`）时，任一 `None` 都令写入以 [`ProtoError::AbsentElement`] 失败，
//!     且不写出任何字节；全部存在时的编码与元素类型 `T` 的序列完全相同；
//! - **设计权衡 (Trade-offs)**：元素本身是集合时（重复的重复字段在协议中没有原生表示），
//!   构造器自动用字段 1 包装消息包裹每个元素。

use std::collections::{BTreeSet, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::wrapper::{MessageWrapperReader, MessageWrapperWriter, read_wrapped_field};
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::reader::ReaderContext;
use crate::wire::{WireType, length_size, make_tag, tag_size, tag_wire_type};
use crate::writer::WriterContext;

/// 可遍历的元素集合（写侧）。
pub trait ProtoItems: Send + Sync + 'static {
    /// 元素类型。
    type Item: Send + Sync + 'static;

    /// 按线上顺序遍历元素的迭代器。
    type Iter<'a>: Iterator<Item = &'a Self::Item>
    where
        Self: 'a;

    /// 元素个数。
    fn item_count(&self) -> usize;

    /// 按线上顺序遍历。
    fn iter_items(&self) -> Self::Iter<'_>;
}

/// 可追加构造的序列（读侧）。
pub trait ProtoSequence: ProtoItems {
    /// 以容量提示创建空序列。
    fn with_capacity(capacity: usize) -> Self;

    /// 预留额外容量；不支持预留的容器忽略提示。
    fn reserve_items(&mut self, _additional: usize) {}

    /// 追加一个元素。
    fn push_item(&mut self, item: Self::Item);

    /// 反转元素顺序；无序容器为空操作。
    fn reverse_items(&mut self) {}
}

impl<T: Send + Sync + 'static> ProtoItems for Vec<T> {
    type Item = T;
    type Iter<'a> = std::slice::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Send + Sync + 'static> ProtoSequence for Vec<T> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.push(item);
    }

    fn reverse_items(&mut self) {
        self.reverse();
    }
}

impl<T: Send + Sync + 'static> ProtoItems for VecDeque<T> {
    type Item = T;
    type Iter<'a> = std::collections::vec_deque::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Send + Sync + 'static> ProtoSequence for VecDeque<T> {
    fn with_capacity(capacity: usize) -> Self {
        VecDeque::with_capacity(capacity)
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.push_back(item);
    }

    fn reverse_items(&mut self) {
        self.make_contiguous().reverse();
    }
}

impl<T: Send + Sync + 'static> ProtoItems for LinkedList<T> {
    type Item = T;
    type Iter<'a> = std::collections::linked_list::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Send + Sync + 'static> ProtoSequence for LinkedList<T> {
    fn with_capacity(_capacity: usize) -> Self {
        LinkedList::new()
    }

    fn push_item(&mut self, item: T) {
        self.push_back(item);
    }

    fn reverse_items(&mut self) {
        let reversed: LinkedList<T> = std::mem::take(self).into_iter().rev().collect();
        *self = reversed;
    }
}

impl<T: Eq + Hash + Send + Sync + 'static> ProtoItems for HashSet<T> {
    type Item = T;
    type Iter<'a> = std::collections::hash_set::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Eq + Hash + Send + Sync + 'static> ProtoSequence for HashSet<T> {
    fn with_capacity(capacity: usize) -> Self {
        HashSet::with_capacity(capacity)
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.insert(item);
    }
}

impl<T: Ord + Send + Sync + 'static> ProtoItems for BTreeSet<T> {
    type Item = T;
    type Iter<'a> = std::collections::btree_set::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Ord + Send + Sync + 'static> ProtoSequence for BTreeSet<T> {
    fn with_capacity(_capacity: usize) -> Self {
        BTreeSet::new()
    }

    fn push_item(&mut self, item: T) {
        self.insert(item);
    }
}

impl<T: Send + Sync + 'static> ProtoItems for Box<[T]> {
    type Item = T;
    type Iter<'a> = std::slice::Iter<'a, T>;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Send + Sync + 'static, const N: usize> ProtoItems for [T; N] {
    type Item = T;
    type Iter<'a> = std::slice::Iter<'a, T>;

    fn item_count(&self) -> usize {
        N
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

/// 元素若自身是集合，则包裹为字段 1 消息。
fn element_reader<T: Send + Sync + 'static>(
    item: Arc<dyn ProtoReader<T>>,
) -> Arc<dyn ProtoReader<T>> {
    if item.is_collection() {
        Arc::new(MessageWrapperReader::new(item))
    } else {
        item
    }
}

fn element_writer<T: Send + Sync + 'static>(
    item: Arc<dyn ProtoWriter<T>>,
) -> Arc<dyn ProtoWriter<T>> {
    if item.is_collection() {
        Arc::new(MessageWrapperWriter::new(item))
    } else {
        item
    }
}

/// 重复字段解码器。
pub struct RepeatedReader<C: ProtoSequence> {
    item: Arc<dyn ProtoReader<C::Item>>,
    reversed: bool,
    _marker: PhantomData<fn() -> C>,
}

impl<C: ProtoSequence> RepeatedReader<C> {
    /// 按线上顺序填充的解码器。
    pub fn new(item: Arc<dyn ProtoReader<C::Item>>) -> Self {
        Self {
            item: element_reader(item),
            reversed: false,
            _marker: PhantomData,
        }
    }

    /// 填充完成后反转顺序的解码器，用于栈一类后进先出容器。
    pub fn reversed(item: Arc<dyn ProtoReader<C::Item>>) -> Self {
        Self {
            reversed: true,
            ..Self::new(item)
        }
    }

    /// 按当前标签的线类型把一次字段出现追加进 `target`。
    fn fill(&self, ctx: &mut ReaderContext<'_>, target: &mut C) -> Result<()> {
        let tag = ctx.last_tag();
        let wire_type = tag_wire_type(tag)?;
        if wire_type == WireType::LengthDelimited && self.item.packable() {
            let len = ctx.read_length()?;
            if let Some(count) = ctx.packed_capacity_hint(len, self.item.fixed_size()) {
                target.reserve_items(count);
            }
            let old = ctx.push_limit(len)?;
            while !ctx.is_reached_limit() {
                target.push_item(self.item.parse_from(ctx)?);
            }
            ctx.pop_limit(old);
            return Ok(());
        }
        if wire_type != self.item.wire_type() {
            return ctx.skip_last_field();
        }
        loop {
            target.push_item(self.item.parse_message_from(ctx)?);
            if !ctx.maybe_consume_tag(tag)? {
                return Ok(());
            }
        }
    }
}

impl<C: ProtoSequence> ProtoReader<C> for RepeatedReader<C> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<C> {
        let mut target = C::with_capacity(0);
        self.fill(ctx, &mut target)?;
        if self.reversed {
            target.reverse_items();
        }
        Ok(target)
    }

    fn default_value(&self) -> Option<C> {
        Some(C::with_capacity(0))
    }

    fn item_wire_type(&self) -> Option<WireType> {
        Some(self.item.wire_type())
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut C) -> Result<()> {
        if self.reversed {
            slot.reverse_items();
            let outcome = self.fill(ctx, slot);
            slot.reverse_items();
            outcome
        } else {
            self.fill(ctx, slot)
        }
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<C> {
        read_wrapped_field(self, ctx)
    }
}

/// 重复字段编码器。
pub struct RepeatedWriter<C: ProtoItems> {
    item: Arc<dyn ProtoWriter<C::Item>>,
    packed: bool,
    _marker: PhantomData<fn() -> C>,
}

impl<C: ProtoItems> RepeatedWriter<C> {
    /// 可打包元素默认打包编码。
    pub fn new(item: Arc<dyn ProtoWriter<C::Item>>) -> Self {
        let item = element_writer(item);
        let packed = item.packable();
        Self {
            item,
            packed,
            _marker: PhantomData,
        }
    }

    /// 强制逐元素带标签编码。
    pub fn unpacked(item: Arc<dyn ProtoWriter<C::Item>>) -> Self {
        Self {
            packed: false,
            ..Self::new(item)
        }
    }

    /// 是否使用打包编码。
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// 缺席元素在线上没有表示，写出任何字节之前整体拒绝。
    fn reject_absent(&self, items: &C) -> Result<()> {
        if !self.item.nullable() {
            return Ok(());
        }
        match items.iter_items().position(|item| self.item.is_absent(item)) {
            Some(index) => Err(ProtoError::AbsentElement {
                index,
                type_name: std::any::type_name::<C::Item>(),
            }),
            None => Ok(()),
        }
    }

    fn packed_payload_size(&self, items: &C) -> usize {
        let width = self.item.fixed_size();
        if width > 0 {
            return width * items.item_count();
        }
        items.iter_items().map(|item| self.item.calculate_size(item)).sum()
    }
}

impl<C: ProtoItems> ProtoWriter<C> for RepeatedWriter<C> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &C) -> usize {
        self.calculate_field_size(1, value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &C) -> Result<()> {
        self.write_field(ctx, 1, value)
    }

    fn should_write(&self, value: &C) -> bool {
        value.item_count() > 0
    }

    fn calculate_field_size(&self, field_number: u32, value: &C) -> usize {
        if value.item_count() == 0 {
            return 0;
        }
        if self.packed {
            let payload = self.packed_payload_size(value);
            return tag_size(field_number) + length_size(payload) + payload;
        }
        value
            .iter_items()
            .map(|item| self.item.calculate_field_size(field_number, item))
            .sum()
    }

    fn write_field(&self, ctx: &mut WriterContext<'_>, field_number: u32, value: &C) -> Result<()> {
        if value.item_count() == 0 {
            return Ok(());
        }
        self.reject_absent(value)?;
        if self.packed {
            ctx.write_tag(make_tag(field_number, WireType::LengthDelimited))?;
            ctx.write_length(self.packed_payload_size(value))?;
            for item in value.iter_items() {
                self.item.write_to(ctx, item)?;
            }
            return Ok(());
        }
        for item in value.iter_items() {
            self.item.write_field(ctx, field_number, item)?;
        }
        Ok(())
    }
}

/// `Box<[T]>` 解码器：先收集为 `Vec<T>`，再转换为定长切片。
pub struct ArrayReader<T: Send + Sync + 'static> {
    inner: RepeatedReader<Vec<T>>,
}

impl<T: Send + Sync + 'static> ArrayReader<T> {
    /// 以元素解码器构造。
    pub fn new(item: Arc<dyn ProtoReader<T>>) -> Self {
        Self {
            inner: RepeatedReader::new(item),
        }
    }
}

impl<T: Send + Sync + 'static> ProtoReader<Box<[T]>> for ArrayReader<T> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Box<[T]>> {
        Ok(self.inner.parse_from(ctx)?.into_boxed_slice())
    }

    fn default_value(&self) -> Option<Box<[T]>> {
        Some(Vec::new().into_boxed_slice())
    }

    fn item_wire_type(&self) -> Option<WireType> {
        self.inner.item_wire_type()
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut Box<[T]>) -> Result<()> {
        let mut items = std::mem::take(slot).into_vec();
        let outcome = self.inner.merge_field(ctx, &mut items);
        *slot = items.into_boxed_slice();
        outcome
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<Box<[T]>> {
        Ok(self.inner.parse_root(ctx)?.into_boxed_slice())
    }
}

/// `[T; N]` 解码器：元素个数必须恰为 `N`。
pub struct FixedArrayReader<T: Send + Sync + 'static, const N: usize> {
    inner: RepeatedReader<Vec<T>>,
}

impl<T: Send + Sync + 'static, const N: usize> FixedArrayReader<T, N> {
    /// 以元素解码器构造。
    pub fn new(item: Arc<dyn ProtoReader<T>>) -> Self {
        Self {
            inner: RepeatedReader::new(item),
        }
    }

    fn finish(items: Vec<T>) -> Result<[T; N]> {
        let actual = items.len();
        items.try_into().map_err(|_| ProtoError::LengthMismatch {
            expected: N,
            actual,
        })
    }
}

impl<T: Send + Sync + 'static, const N: usize> ProtoReader<[T; N]> for FixedArrayReader<T, N> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<[T; N]> {
        Self::finish(self.inner.parse_from(ctx)?)
    }

    fn item_wire_type(&self) -> Option<WireType> {
        self.inner.item_wire_type()
    }

    fn merge_field(&self, ctx: &mut ReaderContext<'_>, slot: &mut [T; N]) -> Result<()> {
        *slot = self.parse_from(ctx)?;
        Ok(())
    }

    fn parse_root(&self, ctx: &mut ReaderContext<'_>) -> Result<[T; N]> {
        Self::finish(self.inner.parse_root(ctx)?)
    }
}
