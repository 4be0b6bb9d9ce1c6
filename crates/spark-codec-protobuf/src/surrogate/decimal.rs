//! 96 位十进制数及其线上代理。
//!
//! 线上布局（与 bcl `Decimal` 互通）：
//! - 字段 1 `low: uint64`：尾数低 64 位（`lo | mid << 32`）；
//! - 字段 2 `high: uint32`：尾数高 32 位；
//! - 字段 3 `sign_scale: uint32`：bit 0 为符号，bit 1..=8 为小数位数。
//!
//! 三个字段均按 proto3 规则省略零值，因此 `0` 编码为空消息。

use std::fmt;

use crate::codec::message::{FieldDescriptor, ProtoMessage};
use crate::codec::scalar::{UInt32Codec, UInt64Codec};
use crate::codec::surrogate::Surrogate;
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::reader::ReaderContext;
use crate::registry::{ProtoType, TypeShape};
use crate::wire::tag_field_number;
use crate::writer::WriterContext;

const MANTISSA_LIMIT: u128 = 1 << 96;

/// 96 位尾数 + 0..=28 位小数的十进制数。
///
/// 相等比较基于表示而非数值：`1.0` 与 `1.00` 不相等，与线上往返语义一致。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    scale: u8,
    negative: bool,
}

impl Decimal {
    /// 允许的最大小数位数。
    pub const MAX_SCALE: u32 = 28;

    /// 零。
    pub const ZERO: Self = Self {
        lo: 0,
        mid: 0,
        hi: 0,
        scale: 0,
        negative: false,
    };

    /// 以有符号尾数与小数位数构造，值为 `mantissa / 10^scale`。
    pub fn new(mantissa: i128, scale: u32) -> Result<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >= MANTISSA_LIMIT {
            return Err(ProtoError::ValueOutOfRange {
                value: mantissa,
                type_name: "Decimal",
            });
        }
        Self::from_parts(
            magnitude as u32,
            (magnitude >> 32) as u32,
            (magnitude >> 64) as u32,
            mantissa < 0,
            scale,
        )
    }

    /// 由三段尾数、符号与小数位数构造。
    pub fn from_parts(lo: u32, mid: u32, hi: u32, negative: bool, scale: u32) -> Result<Self> {
        if scale > Self::MAX_SCALE {
            return Err(ProtoError::ValueOutOfRange {
                value: i128::from(scale),
                type_name: "Decimal::scale",
            });
        }
        Ok(Self {
            lo,
            mid,
            hi,
            scale: scale as u8,
            negative,
        })
    }

    /// 有符号尾数。
    pub fn mantissa(&self) -> i128 {
        let magnitude = i128::from(self.lo) | i128::from(self.mid) << 32 | i128::from(self.hi) << 64;
        if self.negative { -magnitude } else { magnitude }
    }

    /// 小数位数。
    pub fn scale(&self) -> u32 {
        u32::from(self.scale)
    }

    /// 符号位是否置位（包含负零）。
    pub fn is_negative(&self) -> bool {
        self.negative
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        let magnitude = value.unsigned_abs();
        Self {
            lo: magnitude as u32,
            mid: (magnitude >> 32) as u32,
            hi: 0,
            scale: 0,
            negative: value < 0,
        }
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self {
            lo: value as u32,
            mid: (value >> 32) as u32,
            hi: 0,
            scale: 0,
            negative: false,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// [`Decimal`] 的线上代理消息。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecimalProxy {
    /// 尾数低 64 位。
    pub low: u64,
    /// 尾数高 32 位。
    pub high: u32,
    /// 符号位与小数位数。
    pub sign_scale: u32,
}

impl ProtoMessage for DecimalProxy {
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("low", 1),
        FieldDescriptor::new("high", 2),
        FieldDescriptor::new("sign_scale", 3),
    ];

    fn calculate_size(&self) -> usize {
        let mut size = 0;
        if UInt64Codec.should_write(&self.low) {
            size += UInt64Codec.calculate_field_size(1, &self.low);
        }
        if UInt32Codec.should_write(&self.high) {
            size += UInt32Codec.calculate_field_size(2, &self.high);
        }
        if UInt32Codec.should_write(&self.sign_scale) {
            size += UInt32Codec.calculate_field_size(3, &self.sign_scale);
        }
        size
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        if UInt64Codec.should_write(&self.low) {
            UInt64Codec.write_field(ctx, 1, &self.low)?;
        }
        if UInt32Codec.should_write(&self.high) {
            UInt32Codec.write_field(ctx, 2, &self.high)?;
        }
        if UInt32Codec.should_write(&self.sign_scale) {
            UInt32Codec.write_field(ctx, 3, &self.sign_scale)?;
        }
        Ok(())
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        match tag_field_number(tag) {
            1 => UInt64Codec.merge_field(ctx, &mut self.low),
            2 => UInt32Codec.merge_field(ctx, &mut self.high),
            3 => UInt32Codec.merge_field(ctx, &mut self.sign_scale),
            _ => ctx.skip_last_field(),
        }
    }
}

impl Surrogate for Decimal {
    type Proxy = DecimalProxy;

    fn to_surrogate(&self) -> DecimalProxy {
        DecimalProxy {
            low: u64::from(self.lo) | u64::from(self.mid) << 32,
            high: self.hi,
            sign_scale: u32::from(self.negative) | u32::from(self.scale) << 1,
        }
    }

    fn from_surrogate(proxy: DecimalProxy) -> Result<Self> {
        Self::from_parts(
            proxy.low as u32,
            (proxy.low >> 32) as u32,
            proxy.high,
            proxy.sign_scale & 1 == 1,
            (proxy.sign_scale & 0x1FE) >> 1,
        )
    }
}

impl ProtoType for Decimal {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::surrogate()
    }
}

impl ProtoType for DecimalProxy {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}
