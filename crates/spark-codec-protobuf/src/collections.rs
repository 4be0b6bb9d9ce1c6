//! 后进先出栈。
//!
//! 栈在线上按出栈顺序（栈顶在前）写出；解码时顺序压入会把顺序颠倒，
//! 因此重复字段解码器在填充完成后整体反转一次，使往返后的出栈顺序保持一致。

use crate::codec::repeated::{ProtoItems, ProtoSequence};

/// 以 `Vec` 为底层存储的栈，末尾即栈顶。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Stack<T> {
    /// 空栈。
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// 压栈。
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// 出栈。
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// 查看栈顶。
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// 元素个数。
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 从栈顶到栈底遍历。
    pub fn iter(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.items.iter().rev()
    }
}

impl<T> FromIterator<T> for Stack<T> {
    /// 依次压栈，最后一个元素成为栈顶。
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Send + Sync + 'static> ProtoItems for Stack<T> {
    type Item = T;
    type Iter<'a> = std::iter::Rev<std::slice::Iter<'a, T>>;

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn iter_items(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<T: Send + Sync + 'static> ProtoSequence for Stack<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    fn reserve_items(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.items.push(item);
    }

    fn reverse_items(&mut self) {
        self.items.reverse();
    }
}
