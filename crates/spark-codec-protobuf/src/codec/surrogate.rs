//! 代理类型编解码。
//!
//! # 教案式说明
//! - **意图 (Why)**：十进制数、时间点这类值没有天然的 protobuf 表示，需要先换成一个
//!   字段布局明确的代理消息再上线；
//! - **契约 (What)**：编码时 `to_surrogate` 后按代理消息写出；解码时先得到代理消息，
//!   再经 `from_surrogate` 还原，代理值不合法时返回错误而不是静默截断；
//! - **执行逻辑 (How)**：[`SurrogateCodec`] 在两个方向上都委托给 [`MessageCodec`]，
//!   因此代理类型作为字段时与普通嵌套消息完全同构。

use std::marker::PhantomData;

use crate::codec::message::{MessageCodec, ProtoMessage};
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::WireType;
use crate::writer::WriterContext;

/// 经由代理消息编解码的类型。
pub trait Surrogate: Sized + Send + Sync + 'static {
    /// 线上使用的代理消息。
    type Proxy: ProtoMessage;

    /// 转换为代理消息。
    fn to_surrogate(&self) -> Self::Proxy;

    /// 由代理消息还原。
    fn from_surrogate(proxy: Self::Proxy) -> Result<Self>;
}

/// 把 [`Surrogate`] 适配为类型编解码器。
pub struct SurrogateCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SurrogateCodec<T> {
    /// 构造编解码器。
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SurrogateCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SurrogateCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrogateCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Surrogate> ProtoReader<T> for SurrogateCodec<T> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<T> {
        let proxy = MessageCodec::<T::Proxy>::new().parse_from(ctx)?;
        T::from_surrogate(proxy)
    }

    fn default_value(&self) -> Option<T> {
        T::from_surrogate(T::Proxy::default()).ok()
    }
}

impl<T: Surrogate> ProtoWriter<T> for SurrogateCodec<T> {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &T) -> usize {
        value.to_surrogate().calculate_size()
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &T) -> Result<()> {
        value.to_surrogate().write_to(ctx)
    }
}
