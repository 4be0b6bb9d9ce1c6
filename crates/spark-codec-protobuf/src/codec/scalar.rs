//! 标量编解码器。
//!
//! 每个 protobuf 标量类型对应一个零尺寸单元结构体，同一个 Rust 类型可以有多种线上表示
//! （`i32` 可编码为 `int32`/`sint32`/`sfixed32`），注册表默认为 `i32` 绑定 [`Int32Codec`]。

use bytes::Bytes;

use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::reader::ReaderContext;
use crate::wire::{
    self, BOOL_SIZE, FIXED32_SIZE, FIXED64_SIZE, WireType, bytes_size, int32_size, int64_size,
    sint32_size, sint64_size, string_size, varint32_size, varint64_size,
};
use crate::writer::WriterContext;

macro_rules! scalar_codec {
    (
        $(#[$meta:meta])*
        $name:ident: $ty:ty => $wire:expr, fixed = $fixed:expr,
        read = $read:ident, write = $write:ident, size = $size:expr
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl ProtoReader<$ty> for $name {
            fn wire_type(&self) -> WireType {
                $wire
            }

            fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<$ty> {
                ctx.$read()
            }

            fn default_value(&self) -> Option<$ty> {
                Some(<$ty>::default())
            }

            fn packable(&self) -> bool {
                true
            }

            fn fixed_size(&self) -> usize {
                $fixed
            }
        }

        impl ProtoWriter<$ty> for $name {
            fn wire_type(&self) -> WireType {
                $wire
            }

            fn packable(&self) -> bool {
                true
            }

            fn fixed_size(&self) -> usize {
                $fixed
            }

            fn calculate_size(&self, value: &$ty) -> usize {
                let size: fn($ty) -> usize = $size;
                size(*value)
            }

            fn write_to(&self, ctx: &mut WriterContext<'_>, value: &$ty) -> Result<()> {
                ctx.$write(*value)
            }

            fn should_write(&self, value: &$ty) -> bool {
                *value != <$ty>::default()
            }
        }
    };
}

scalar_codec! {
    /// `int32`：负数按 10 字节符号扩展。
    Int32Codec: i32 => WireType::Varint, fixed = 0,
    read = read_int32, write = write_int32, size = int32_size
}

scalar_codec! {
    /// `uint32`。
    UInt32Codec: u32 => WireType::Varint, fixed = 0,
    read = read_uint32, write = write_uint32, size = varint32_size
}

scalar_codec! {
    /// `sint32`：zigzag 编码。
    SInt32Codec: i32 => WireType::Varint, fixed = 0,
    read = read_sint32, write = write_sint32, size = sint32_size
}

scalar_codec! {
    /// `fixed32`。
    Fixed32Codec: u32 => WireType::Fixed32, fixed = FIXED32_SIZE,
    read = read_fixed32, write = write_fixed32, size = |_| FIXED32_SIZE
}

scalar_codec! {
    /// `sfixed32`。
    SFixed32Codec: i32 => WireType::Fixed32, fixed = FIXED32_SIZE,
    read = read_sfixed32, write = write_sfixed32, size = |_| FIXED32_SIZE
}

scalar_codec! {
    /// `int64`。
    Int64Codec: i64 => WireType::Varint, fixed = 0,
    read = read_int64, write = write_int64, size = int64_size
}

scalar_codec! {
    /// `uint64`。
    UInt64Codec: u64 => WireType::Varint, fixed = 0,
    read = read_uint64, write = write_uint64, size = varint64_size
}

scalar_codec! {
    /// `sint64`：zigzag 编码。
    SInt64Codec: i64 => WireType::Varint, fixed = 0,
    read = read_sint64, write = write_sint64, size = sint64_size
}

scalar_codec! {
    /// `fixed64`。
    Fixed64Codec: u64 => WireType::Fixed64, fixed = FIXED64_SIZE,
    read = read_fixed64, write = write_fixed64, size = |_| FIXED64_SIZE
}

scalar_codec! {
    /// `sfixed64`。
    SFixed64Codec: i64 => WireType::Fixed64, fixed = FIXED64_SIZE,
    read = read_sfixed64, write = write_sfixed64, size = |_| FIXED64_SIZE
}

scalar_codec! {
    /// `bool`：单字节 varint，打包时按定宽 1 预分配。
    BoolCodec: bool => WireType::Varint, fixed = BOOL_SIZE,
    read = read_bool, write = write_bool, size = |_| BOOL_SIZE
}

scalar_codec! {
    /// `float`。
    FloatCodec: f32 => WireType::Fixed32, fixed = FIXED32_SIZE,
    read = read_float, write = write_float, size = |_| FIXED32_SIZE
}

scalar_codec! {
    /// `double`。
    DoubleCodec: f64 => WireType::Fixed64, fixed = FIXED64_SIZE,
    read = read_double, write = write_double, size = |_| FIXED64_SIZE
}

macro_rules! narrow_codec {
    ($(#[$meta:meta])* $name:ident: $ty:ty => $wide:ty, read = $read:ident, write = $write:ident, size = $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl ProtoReader<$ty> for $name {
            fn wire_type(&self) -> WireType {
                WireType::Varint
            }

            fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<$ty> {
                let wide = ctx.$read()?;
                <$ty>::try_from(wide).map_err(|_| ProtoError::ValueOutOfRange {
                    value: i128::from(wide),
                    type_name: stringify!($ty),
                })
            }

            fn default_value(&self) -> Option<$ty> {
                Some(0)
            }

            fn packable(&self) -> bool {
                true
            }
        }

        impl ProtoWriter<$ty> for $name {
            fn wire_type(&self) -> WireType {
                WireType::Varint
            }

            fn packable(&self) -> bool {
                true
            }

            fn calculate_size(&self, value: &$ty) -> usize {
                let size: fn($wide) -> usize = $size;
                size(<$wide>::from(*value))
            }

            fn write_to(&self, ctx: &mut WriterContext<'_>, value: &$ty) -> Result<()> {
                ctx.$write(<$wide>::from(*value))
            }

            fn should_write(&self, value: &$ty) -> bool {
                *value != 0
            }
        }
    };
}

narrow_codec! {
    /// `i8`，线上为 `int32`。
    Int8Codec: i8 => i32, read = read_int32, write = write_int32, size = int32_size
}

narrow_codec! {
    /// `i16`，线上为 `int32`。
    Int16Codec: i16 => i32, read = read_int32, write = write_int32, size = int32_size
}

narrow_codec! {
    /// `u8`，线上为 `uint32`。
    UInt8Codec: u8 => u32, read = read_uint32, write = write_uint32, size = varint32_size
}

narrow_codec! {
    /// `u16`，线上为 `uint32`。
    UInt16Codec: u16 => u32, read = read_uint32, write = write_uint32, size = varint32_size
}

/// `string`。
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl ProtoReader<String> for StringCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<String> {
        ctx.read_string()
    }

    fn default_value(&self) -> Option<String> {
        Some(String::new())
    }
}

impl ProtoWriter<String> for StringCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn calculate_size(&self, value: &String) -> usize {
        string_size(value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &String) -> Result<()> {
        ctx.write_string(value)
    }

    fn should_write(&self, value: &String) -> bool {
        !value.is_empty()
    }
}

/// `bytes`，绑定到 `Vec<u8>` 与 [`bytes::Bytes`]。
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl ProtoReader<Vec<u8>> for BytesCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Vec<u8>> {
        Ok(ctx.read_bytes()?.to_vec())
    }

    fn default_value(&self) -> Option<Vec<u8>> {
        Some(Vec::new())
    }
}

impl ProtoWriter<Vec<u8>> for BytesCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn calculate_size(&self, value: &Vec<u8>) -> usize {
        bytes_size(value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &Vec<u8>) -> Result<()> {
        ctx.write_bytes(value)
    }

    fn should_write(&self, value: &Vec<u8>) -> bool {
        !value.is_empty()
    }
}

impl ProtoReader<Bytes> for BytesCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(ctx.read_bytes()?))
    }

    fn default_value(&self) -> Option<Bytes> {
        Some(Bytes::new())
    }
}

impl ProtoWriter<Bytes> for BytesCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn calculate_size(&self, value: &Bytes) -> usize {
        wire::bytes_size(value)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &Bytes) -> Result<()> {
        ctx.write_bytes(value)
    }

    fn should_write(&self, value: &Bytes) -> bool {
        !value.is_empty()
    }
}
