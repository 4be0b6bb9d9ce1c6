//! 内建代理类型：十进制数、时间点与时长。
//!
//! 这些类型都经由 [`Surrogate`](crate::codec::surrogate::Surrogate) 映射为固定布局的代理消息，
//! 与注册表对接时声明为 [`TypeShape::surrogate`](crate::TypeShape::surrogate)。

pub mod decimal;
pub mod time;

pub use decimal::{Decimal, DecimalProxy};
pub use time::{
    DateTimeKind, DurationProxy, MAX_TICKS, MIN_TICKS, ScaledDateTime, ScaledDateTimeCodec,
    TimeSpanScale, Timestamp,
};
