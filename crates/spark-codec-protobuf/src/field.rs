//! 协作方边界上的字段选择器。
//!
//! 持久化、索引等协作方只知道成员名，却需要按字段号定位线上数据；
//! [`FieldSelector::resolve`] 依据 [`ProtoMessage::FIELDS`] 完成这次映射。
//! 表达式可以是成员名，也可以是 `#<字段号>` 形式的直接引用。

use std::any::type_name;

use crate::codec::message::ProtoMessage;
use crate::error::{ProtoError, Result};
use crate::wire::MAX_FIELD_NUMBER;

/// 已解析的字段引用。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldSelector {
    number: u32,
    name: Option<&'static str>,
}

impl FieldSelector {
    /// 把成员名或 `#n` 解析为 `M` 的字段。
    ///
    /// `#n` 形式只校验字段号范围；若 `M` 的描述表登记了该字段号，同时补全成员名。
    pub fn resolve<M: ProtoMessage>(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let invalid = || ProtoError::InvalidFieldExpression {
            expression: expression.to_owned(),
            type_name: type_name::<M>(),
        };

        if let Some(raw) = trimmed.strip_prefix('#') {
            let number = raw
                .parse::<u32>()
                .ok()
                .filter(|number| (1..=MAX_FIELD_NUMBER).contains(number))
                .ok_or_else(invalid)?;
            let name = M::FIELDS
                .iter()
                .find(|field| field.number == number)
                .map(|field| field.name);
            return Ok(Self { number, name });
        }

        M::FIELDS
            .iter()
            .find(|field| field.name == trimmed)
            .map(|field| Self {
                number: field.number,
                name: Some(field.name),
            })
            .ok_or_else(invalid)
    }

    /// 字段号。
    pub fn number(&self) -> u32 {
        self.number
    }

    /// 成员名；直接以字段号引用且描述表未登记时为 `None`。
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}
