//! 时间点与时长的代理。
//!
//! # 教案式说明
//! - **意图 (Why)**：`SystemTime`/`Duration` 在不同平台的内部表示各异，线上必须落到与其它实现
//!   互通的整数布局；
//! - **契约 (What)**：
//!   - [`Timestamp`]：`{ int64 seconds = 1; int32 nanos = 2; }`，秒向下取整，`nanos ∈ [0, 1e9)`；
//!     这是 `SystemTime` 的默认编码；
//!   - [`DurationProxy`]：`std::time::Duration` 的同构布局，负值或越界纳秒解码失败；
//!   - [`ScaledDateTime`]：bcl 风格 `{ sint64 value = 1; TimeSpanScale scale = 2; DateTimeKind kind = 3; }`，
//!     编码时选取能整除偏移量的最粗刻度，`MinMax ±1` 表示最小/最大哨兵时刻；
//!     通过 [`ScaledDateTimeCodec`] 显式注册后替换 `SystemTime` 的默认编码；
//! - **执行逻辑 (How)**：全部换算只用整数运算，先把时间点拆成"向下取整的秒 + 非负纳秒"，
//!   再在 `i128` 上计算刻度，避免浮点误差与中间溢出。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::codec::enumeration::EnumCodec;
use crate::codec::message::{FieldDescriptor, MessageCodec, ProtoMessage};
use crate::codec::scalar::{Int32Codec, Int64Codec, SInt64Codec};
use crate::codec::surrogate::Surrogate;
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::reader::ReaderContext;
use crate::registry::{ProtoType, TypeShape};
use crate::wire::{WireType, tag_field_number};
use crate::writer::WriterContext;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_TICK: i128 = 100;
const TICKS_PER_MILLISECOND: i64 = 10_000;
const TICKS_PER_SECOND: i64 = TICKS_PER_MILLISECOND * 1_000;
const TICKS_PER_MINUTE: i64 = TICKS_PER_SECOND * 60;
const TICKS_PER_HOUR: i64 = TICKS_PER_MINUTE * 60;
const TICKS_PER_DAY: i64 = TICKS_PER_HOUR * 24;

/// 最小哨兵时刻（0001-01-01T00:00:00）相对 Unix 纪元的 tick 偏移。
pub const MIN_TICKS: i64 = -621_355_968_000_000_000;
/// 最大哨兵时刻（9999-12-31T23:59:59.9999999）相对 Unix 纪元的 tick 偏移。
pub const MAX_TICKS: i64 = 2_534_023_007_999_999_999;

/// 把时间点拆成向下取整的秒与非负纳秒。
fn split_system_time(time: SystemTime) -> (i128, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (i128::from(after.as_secs()), after.subsec_nanos()),
        Err(err) => {
            let before = err.duration();
            let seconds = -i128::from(before.as_secs());
            match before.subsec_nanos() {
                0 => (seconds, 0),
                nanos => (seconds - 1, 1_000_000_000 - nanos),
            }
        }
    }
}

/// 由向下取整的秒与非负纳秒重建时间点；平台无法表示时返回 `None`。
fn join_system_time(seconds: i128, nanos: u32) -> Option<SystemTime> {
    if seconds >= 0 {
        let whole = UNIX_EPOCH.checked_add(Duration::from_secs(u64::try_from(seconds).ok()?))?;
        whole.checked_add(Duration::from_nanos(u64::from(nanos)))
    } else {
        let whole =
            UNIX_EPOCH.checked_sub(Duration::from_secs(u64::try_from(seconds.unsigned_abs()).ok()?))?;
        whole.checked_add(Duration::from_nanos(u64::from(nanos)))
    }
}

fn out_of_range(value: i128, type_name: &'static str) -> ProtoError {
    ProtoError::ValueOutOfRange { value, type_name }
}

fn saturate_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// 时间点代理。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// 相对 Unix 纪元的秒，向下取整。
    pub seconds: i64,
    /// 秒内纳秒，`[0, 1e9)`。
    pub nanos: i32,
}

impl ProtoMessage for Timestamp {
    const FIELDS: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("seconds", 1), FieldDescriptor::new("nanos", 2)];

    fn calculate_size(&self) -> usize {
        let mut size = 0;
        if Int64Codec.should_write(&self.seconds) {
            size += Int64Codec.calculate_field_size(1, &self.seconds);
        }
        if Int32Codec.should_write(&self.nanos) {
            size += Int32Codec.calculate_field_size(2, &self.nanos);
        }
        size
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        if Int64Codec.should_write(&self.seconds) {
            Int64Codec.write_field(ctx, 1, &self.seconds)?;
        }
        if Int32Codec.should_write(&self.nanos) {
            Int32Codec.write_field(ctx, 2, &self.nanos)?;
        }
        Ok(())
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        match tag_field_number(tag) {
            1 => Int64Codec.merge_field(ctx, &mut self.seconds),
            2 => Int32Codec.merge_field(ctx, &mut self.nanos),
            _ => ctx.skip_last_field(),
        }
    }
}

impl Timestamp {
    fn checked_nanos(&self, type_name: &'static str) -> Result<u32> {
        u32::try_from(self.nanos)
            .ok()
            .filter(|nanos| i128::from(*nanos) < NANOS_PER_SECOND)
            .ok_or_else(|| out_of_range(i128::from(self.nanos), type_name))
    }
}

impl Surrogate for SystemTime {
    type Proxy = Timestamp;

    fn to_surrogate(&self) -> Timestamp {
        let (seconds, nanos) = split_system_time(*self);
        Timestamp {
            seconds: saturate_i64(seconds),
            nanos: nanos as i32,
        }
    }

    fn from_surrogate(proxy: Timestamp) -> Result<Self> {
        let nanos = proxy.checked_nanos("SystemTime::nanos")?;
        join_system_time(i128::from(proxy.seconds), nanos)
            .ok_or_else(|| out_of_range(i128::from(proxy.seconds), "SystemTime"))
    }
}

/// 时长代理，与 [`Timestamp`] 同构。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DurationProxy(pub Timestamp);

impl ProtoMessage for DurationProxy {
    const FIELDS: &'static [FieldDescriptor] = Timestamp::FIELDS;

    fn calculate_size(&self) -> usize {
        self.0.calculate_size()
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        self.0.write_to(ctx)
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        self.0.merge_field(ctx, tag)
    }
}

impl Surrogate for Duration {
    type Proxy = DurationProxy;

    fn to_surrogate(&self) -> DurationProxy {
        DurationProxy(Timestamp {
            seconds: i64::try_from(self.as_secs()).unwrap_or(i64::MAX),
            nanos: self.subsec_nanos() as i32,
        })
    }

    fn from_surrogate(proxy: DurationProxy) -> Result<Self> {
        let nanos = proxy.0.checked_nanos("Duration::nanos")?;
        let seconds = u64::try_from(proxy.0.seconds)
            .map_err(|_| out_of_range(i128::from(proxy.0.seconds), "Duration"))?;
        Ok(Duration::new(seconds, nanos))
    }
}

/// [`ScaledDateTime`] 的时间刻度。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeSpanScale {
    /// 天。
    #[default]
    Days,
    /// 小时。
    Hours,
    /// 分钟。
    Minutes,
    /// 秒。
    Seconds,
    /// 毫秒。
    Milliseconds,
    /// 100 纳秒。
    Ticks,
    /// 最小/最大哨兵。
    MinMax,
}

crate::proto_enum!(TimeSpanScale {
    Days = 0,
    Hours = 1,
    Minutes = 2,
    Seconds = 3,
    Milliseconds = 4,
    Ticks = 5,
    MinMax = 15,
});

impl TimeSpanScale {
    fn ticks_per_unit(self) -> Option<i64> {
        match self {
            Self::Days => Some(TICKS_PER_DAY),
            Self::Hours => Some(TICKS_PER_HOUR),
            Self::Minutes => Some(TICKS_PER_MINUTE),
            Self::Seconds => Some(TICKS_PER_SECOND),
            Self::Milliseconds => Some(TICKS_PER_MILLISECOND),
            Self::Ticks => Some(1),
            Self::MinMax => None,
        }
    }
}

/// 时间点的时区语义，只随值透传，不参与换算。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    /// 未指定。
    #[default]
    Unspecified,
    /// 协调世界时。
    Utc,
    /// 本地时间。
    Local,
}

crate::proto_enum!(DateTimeKind {
    Unspecified = 0,
    Utc = 1,
    Local = 2,
});

/// 按刻度压缩的时间点代理。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScaledDateTime {
    /// 以 `scale` 为单位相对 Unix 纪元的偏移。
    pub value: i64,
    /// 刻度。
    pub scale: TimeSpanScale,
    /// 时区语义。
    pub kind: DateTimeKind,
}

impl ScaledDateTime {
    /// 以最粗的可整除刻度表示 tick 偏移；哨兵偏移编码为 `MinMax ±1`。
    pub fn from_ticks(ticks: i64, kind: DateTimeKind) -> Self {
        if ticks == MIN_TICKS || ticks == MAX_TICKS {
            return Self {
                value: if ticks == MIN_TICKS { -1 } else { 1 },
                scale: TimeSpanScale::MinMax,
                kind: DateTimeKind::Unspecified,
            };
        }
        let scales = [
            TimeSpanScale::Days,
            TimeSpanScale::Hours,
            TimeSpanScale::Minutes,
            TimeSpanScale::Seconds,
            TimeSpanScale::Milliseconds,
        ];
        for scale in scales {
            let unit = scale.ticks_per_unit().unwrap_or(1);
            if ticks % unit == 0 {
                return Self {
                    value: ticks / unit,
                    scale,
                    kind,
                };
            }
        }
        Self {
            value: ticks,
            scale: TimeSpanScale::Ticks,
            kind,
        }
    }

    /// 还原 tick 偏移；`MinMax` 只接受 ±1，乘法溢出视为越界。
    pub fn to_ticks(&self) -> Result<i64> {
        match self.scale.ticks_per_unit() {
            Some(unit) => self
                .value
                .checked_mul(unit)
                .ok_or_else(|| out_of_range(i128::from(self.value), "ScaledDateTime::value")),
            None => match self.value {
                -1 => Ok(MIN_TICKS),
                1 => Ok(MAX_TICKS),
                other => Err(out_of_range(i128::from(other), "ScaledDateTime::value")),
            },
        }
    }

    /// 由时间点构造；超出 tick 表示范围的时间点饱和到 `i64` 边界。
    pub fn from_system_time(time: SystemTime, kind: DateTimeKind) -> Self {
        let (seconds, nanos) = split_system_time(time);
        let ticks = seconds * (NANOS_PER_SECOND / NANOS_PER_TICK) + i128::from(nanos) / NANOS_PER_TICK;
        Self::from_ticks(saturate_i64(ticks), kind)
    }

    /// 还原为时间点。
    pub fn to_system_time(&self) -> Result<SystemTime> {
        let ticks = i128::from(self.to_ticks()?);
        let nanos = ticks * NANOS_PER_TICK;
        let seconds = nanos.div_euclid(NANOS_PER_SECOND);
        let sub = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
        join_system_time(seconds, sub).ok_or_else(|| out_of_range(ticks, "SystemTime"))
    }
}

impl ProtoMessage for ScaledDateTime {
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("value", 1),
        FieldDescriptor::new("scale", 2),
        FieldDescriptor::new("kind", 3),
    ];

    fn calculate_size(&self) -> usize {
        let mut size = 0;
        if SInt64Codec.should_write(&self.value) {
            size += SInt64Codec.calculate_field_size(1, &self.value);
        }
        if EnumCodec::<TimeSpanScale>::new().should_write(&self.scale) {
            size += EnumCodec::<TimeSpanScale>::new().calculate_field_size(2, &self.scale);
        }
        if EnumCodec::<DateTimeKind>::new().should_write(&self.kind) {
            size += EnumCodec::<DateTimeKind>::new().calculate_field_size(3, &self.kind);
        }
        size
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        if SInt64Codec.should_write(&self.value) {
            SInt64Codec.write_field(ctx, 1, &self.value)?;
        }
        let scale = EnumCodec::<TimeSpanScale>::new();
        if scale.should_write(&self.scale) {
            scale.write_field(ctx, 2, &self.scale)?;
        }
        let kind = EnumCodec::<DateTimeKind>::new();
        if kind.should_write(&self.kind) {
            kind.write_field(ctx, 3, &self.kind)?;
        }
        Ok(())
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        match tag_field_number(tag) {
            1 => SInt64Codec.merge_field(ctx, &mut self.value),
            2 => EnumCodec::<TimeSpanScale>::new().merge_field(ctx, &mut self.scale),
            3 => EnumCodec::<DateTimeKind>::new().merge_field(ctx, &mut self.kind),
            _ => ctx.skip_last_field(),
        }
    }
}

/// 以 [`ScaledDateTime`] 布局编解码 `SystemTime` 的编解码器。
///
/// ```
/// use std::time::SystemTime;
/// use spark_codec_protobuf::CodecRegistry;
/// use spark_codec_protobuf::surrogate::{DateTimeKind, ScaledDateTimeCodec};
///
/// let registry = CodecRegistry::new();
/// assert!(registry.register_codec::<SystemTime, _>(ScaledDateTimeCodec::new(DateTimeKind::Utc)));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ScaledDateTimeCodec {
    kind: DateTimeKind,
}

impl ScaledDateTimeCodec {
    /// 编码时写出的时区语义。
    pub const fn new(kind: DateTimeKind) -> Self {
        Self { kind }
    }
}

impl ProtoReader<SystemTime> for ScaledDateTimeCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn parse_from(&self, ctx: &mut ReaderContext<'_>) -> Result<SystemTime> {
        MessageCodec::<ScaledDateTime>::new()
            .parse_from(ctx)?
            .to_system_time()
    }

    fn default_value(&self) -> Option<SystemTime> {
        Some(UNIX_EPOCH)
    }
}

impl ProtoWriter<SystemTime> for ScaledDateTimeCodec {
    fn wire_type(&self) -> WireType {
        WireType::LengthDelimited
    }

    fn is_message(&self) -> bool {
        true
    }

    fn calculate_size(&self, value: &SystemTime) -> usize {
        ScaledDateTime::from_system_time(*value, self.kind).calculate_size()
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>, value: &SystemTime) -> Result<()> {
        ScaledDateTime::from_system_time(*value, self.kind).write_to(ctx)
    }
}

impl ProtoType for SystemTime {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::surrogate()
    }
}

impl ProtoType for Duration {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::surrogate()
    }
}

impl ProtoType for Timestamp {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}

impl ProtoType for DurationProxy {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}

impl ProtoType for ScaledDateTime {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}
