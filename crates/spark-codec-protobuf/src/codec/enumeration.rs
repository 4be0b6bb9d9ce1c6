//! 枚举编解码。
//!
//! 枚举在线上就是其底层整数的 `int32` varint；未知数值（来自新版本生产者）不视为错误，
//! 回落到枚举的 [`Default`] 并记录 `debug` 事件。

use std::marker::PhantomData;

use tracing::debug;

use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::Result;
use crate::reader::ReaderContext;
use crate::wire::{WireType, int32_size};
use crate::writer::WriterContext;

/// 可编码为 protobuf 枚举的类型。
pub trait ProtoEnum: Copy + Default + Send + Sync + 'static {
    /// 底层整数值。
    fn to_i32(self) -> i32;

    /// 由整数值还原；未知值返回 `None`。
    fn from_i32(value: i32) -> Option<Self>;
}

/// 为 `#[repr(i32)]` 风格的 C-like 枚举生成 [`ProtoEnum`] 与 [`ProtoType`](crate::ProtoType) 实现。
///
/// ```
/// use spark_codec_protobuf::proto_enum;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// enum Phase {
///     #[default]
///     Idle = 0,
///     Running = 1,
///     Done = 2,
/// }
///
/// proto_enum!(Phase { Idle = 0, Running = 1, Done = 2 });
/// ```
#[macro_export]
macro_rules! proto_enum {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        impl $crate::ProtoEnum for $name {
            fn to_i32(self) -> i32 {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            fn from_i32(value: i32) -> ::core::option::Option<Self> {
                match value {
                    $(v if v == $value => ::core::option::Option::Some(Self::$variant),)+
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl $crate::ProtoType for $name {
            fn type_shape() -> $crate::TypeShape<Self> {
                $crate::TypeShape::enumeration()
            }
        }
    };
}

/// 枚举编解码器。
pub struct EnumCodec<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> EnumCodec<E> {
    /// 构造编解码器。
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for EnumCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EnumCodec<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EnumCodec<E> {}

impl<E> std::fmt::Debug for EnumCodec<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumCodec")
            .field("enum", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: ProtoEnum> ProtoReader<E> for EnumCodec<E> {
    fn wire_type(&self) -> WireType {
        WireType::Varint
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<E> {
        let raw = ctx.read_enum()?;
        Ok(E::from_i32(raw).unwrap_or_else(|| {
            debug!(
                enum_type = std::any::type_name::<E>(),
                value = raw,
                "unknown enum value decoded as default"
            );
            E::default()
        }))
    }

    fn default_value(&self) -> Option<E> {
        Some(E::default())
    }

    fn packable(&self) -> bool {
        true
    }
}

impl<E: ProtoEnum> ProtoWriter<E> for EnumCodec<E> {
    fn wire_type(&self) -> WireType {
        WireType::Varint
    }

    fn packable(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &E) -> usize {
        int32_size(value.to_i32())
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &E) -> Result<()> {
        ctx.write_enum(value.to_i32())
    }

    fn should_write(&self, value: &E) -> bool {
        value.to_i32() != 0
    }
}
