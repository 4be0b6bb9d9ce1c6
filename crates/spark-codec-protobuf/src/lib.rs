#![warn(missing_docs)]

//! # spark-codec-protobuf
//!
//! ## 教案意图（Why）
//! - **职责定位**：不依赖 schema 编译器的 protobuf 线格式编解码引擎：强类型值与 varint/zigzag/
//!   fixed32/fixed64/长度界定编码之间的双向转换；
//! - **架构价值**：每个类型的编解码器要么在编译期显式绑定（实现 [`ProtoMessage`] 或直接持有
//!   [`ProtoReader`]/[`ProtoWriter`]），要么在首次使用时由 [`CodecRegistry`] 按类型形状递归拼装并缓存，
//!   上层持久化、深拷贝、网络分帧只需 [`serialize`]/[`deserialize`]/[`deep_clone`] 三个入口。
//!
//! ## 使用方式（How）
//! - 自描述消息实现 [`ProtoMessage`] 与 [`ProtoType`]（`TypeShape::message()`）；
//!   枚举通过 [`proto_enum!`] 一行接入；标准集合、映射、`Option`、`Box` 已内建形状；
//! - 同一条流上的多个值使用 [`serialize_with_length_prefix`] 与 [`deserialize_items`] 分帧；
//! - 宿主可从 TOML 等配置源反序列化 [`CodecOptions`]，再以 [`CodecRegistry::with_options`] 生效。
//!
//! ## 契约说明（What）
//! - 线格式与 protobuf 逐字节兼容；标量与消息字段后写覆盖，重复字段追加，线类型不符的字段按未知字段跳过；
//! - 递归深度与输入尺寸上限是对抗恶意输入的唯一边界，任何截断输入都返回 [`ProtoError`] 而不会 panic；
//! - 注册表是唯一的共享结构，编解码器一经发布不再替换。
//!
//! ## 风险提示（Trade-offs）
//! - 全部接口均为同步调用，不提供异步或取消语义；
//! - 动态解析依赖 `TypeId` 与类型擦除缓存，首次使用某类型时会有一次构建开销。

pub mod codec;
pub mod collections;
pub mod error;
pub mod field;
pub mod framing;
pub mod options;
pub mod pool;
pub mod reader;
pub mod registry;
pub mod serializer;
pub mod surrogate;
pub mod unknown;
pub mod wire;
pub mod writer;

pub use codec::enumeration::{EnumCodec, ProtoEnum};
pub use codec::message::{FieldDescriptor, MessageCodec, ProtoMessage};
pub use codec::surrogate::{Surrogate, SurrogateCodec};
pub use codec::{ProtoReader, ProtoWriter};
pub use collections::Stack;
pub use error::{ProtoError, Result, codes};
pub use field::FieldSelector;
pub use framing::{DeserializeItems, FrameOutcome, PrefixStyle};
pub use options::CodecOptions;
pub use reader::ReaderContext;
pub use registry::{CodecRegistry, OpenShape, ProtoType, ShapeConstructor, TypeShape};
pub use serializer::{
    deep_clone, deserialize, deserialize_items, deserialize_with, deserialize_with_codec,
    deserialize_with_length_prefix, serialize, serialize_to_vec, serialize_to_writer,
    serialize_with_codec, serialize_with_length_prefix,
};
pub use surrogate::{Decimal, DurationProxy, ScaledDateTime, ScaledDateTimeCodec, Timestamp};
pub use unknown::UnknownFields;
pub use wire::WireType;
pub use writer::{ByteSink, FlatBuffer, StreamSink, WriterContext};
