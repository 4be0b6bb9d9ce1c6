//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为编解码引擎对外暴露的失败语义提供集中定义：游标、类型编解码器、动态解析器与分帧层共用同一错误域；
//! - 每个变体映射到稳定错误码（`protobuf.*`），便于上层持久化/克隆调用方做指标聚合与告警。
//!
//! ## 设计要求（What）
//! - 所有错误均派生 `thiserror::Error`，可直接参与 `?` 传播与 `std::error::Error` 链；
//! - 游标与编解码层绝不吞错：任何失败都以 [`ProtoError`] 形式交还直接调用方；
//! - 未知字段跳过、分帧字段号不匹配均属于正常控制流，不在此处建模。
//!
//! ## 扩展建议（How）
//! - 新增变体时同步在 [`codes`] 中登记错误码，并更新 [`ProtoError::code`] 的映射。

use std::borrow::Cow;
use std::io;

use thiserror::Error;

/// 稳定错误码常量。
///
/// 码值一经发布不得修改，监控规则与重试策略直接依赖这些字符串。
pub mod codes {
    /// varint 超过最大字节数仍带续位。
    pub const MALFORMED_VARINT: &str = "protobuf.decode.malformed_varint";
    /// 输入在定长或长度界定负载中途结束。
    pub const TRUNCATED_MESSAGE: &str = "protobuf.decode.truncated";
    /// 嵌套消息超过递归上限。
    pub const RECURSION_LIMIT: &str = "protobuf.decode.recursion_limit";
    /// 输入总长超过配置的尺寸上限。
    pub const SIZE_LIMIT: &str = "protobuf.decode.size_limit";
    /// 读取到非法标签（字段号 0 或未知线类型）。
    pub const INVALID_TAG: &str = "protobuf.decode.invalid_tag";
    /// 字符串字段不是合法 UTF-8。
    pub const INVALID_UTF8: &str = "protobuf.decode.invalid_utf8";
    /// 定长数组的元素个数与线上数据不一致。
    pub const LENGTH_MISMATCH: &str = "protobuf.decode.length_mismatch";
    /// 数值超出目标类型表示范围。
    pub const VALUE_OUT_OF_RANGE: &str = "protobuf.decode.value_out_of_range";
    /// 必需字段缺失且目标类型没有默认值。
    pub const MISSING_FIELD: &str = "protobuf.decode.missing_field";
    /// 平面缓冲写满。
    pub const OUT_OF_SPACE: &str = "protobuf.encode.out_of_space";
    /// 预计算尺寸与实际写出字节数不符。
    pub const SIZE_MISMATCH: &str = "protobuf.encode.size_mismatch";
    /// 重复字段中出现无法在线上表示的缺席元素。
    pub const ABSENT_ELEMENT: &str = "protobuf.encode.absent_element";
    /// 动态解析器无法为类型构建编解码器。
    pub const UNREGISTERED_TYPE: &str = "protobuf.registry.unregistered";
    /// 开放形状映射到了不兼容的构造器。
    pub const SHAPE_MISMATCH: &str = "protobuf.registry.shape_mismatch";
    /// 缓存中的条目与请求类型不符。
    pub const TYPE_MISMATCH: &str = "protobuf.registry.type_mismatch";
    /// 调用方字段表达式无法解析。
    pub const INVALID_FIELD_EXPRESSION: &str = "protobuf.boundary.invalid_field_expression";
    /// 底层流 I/O 失败。
    pub const IO: &str = "protobuf.io";
}

/// 编解码引擎的统一错误类型。
///
/// # 教案式说明
/// - **意图 (Why)**：覆盖线格式解析、编码输出、动态解析与分帧四类失败，保证调用方拿到可分类的类型化错误；
/// - **契约 (What)**：
///   - 所有变体满足 `Send + Sync + 'static`，可跨线程传播；
///   - [`ProtoError::code`] 返回稳定错误码，可直接用于指标标签；
/// - **设计权衡 (Trade-offs)**：类型名使用 `Cow<'static, str>`，编译期已知的名称零分配，
///   运行期拼接的名称（如泛型实参）才落到堆上。
#[derive(Debug, Error)]
pub enum ProtoError {
    /// varint 在最大长度（32 位 5 字节 / 64 位 10 字节）处仍带续位。
    #[error("malformed varint: continuation bit set past the maximum encoded length")]
    MalformedVarint,

    /// 输入在期望的负载完整之前结束。
    ///
    /// - 也用于长度前缀声明的区域越过物理缓冲或外层限界的情形。
    #[error("truncated message: input ended inside a field or length-delimited region")]
    TruncatedMessage,

    /// 嵌套消息深度达到上限。
    #[error("message too deeply nested: recursion limit {limit} reached")]
    RecursionLimitExceeded {
        /// 生效的递归上限。
        limit: u32,
    },

    /// 输入总长度超过配置的尺寸上限。
    #[error("message of {size} bytes exceeds the configured size limit {limit}")]
    SizeLimitExceeded {
        /// 待解析字节数。
        size: usize,
        /// 生效的尺寸上限。
        limit: usize,
    },

    /// 非法标签：字段号为 0 或线类型不在协议定义之内。
    #[error("invalid tag {0:#x}")]
    InvalidTag(u32),

    /// 字符串字段包含非法 UTF-8。
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// 定长数组元素个数不匹配。
    #[error("fixed-size array expected {expected} elements, decoded {actual}")]
    LengthMismatch {
        /// 类型声明的长度。
        expected: usize,
        /// 线上实际解码出的元素个数。
        actual: usize,
    },

    /// 数值超出目标类型范围（如窄整数、时间戳溢出）。
    #[error("value {value} out of range for `{type_name}`")]
    ValueOutOfRange {
        /// 线上读到的原始数值。
        value: i128,
        /// 目标类型名。
        type_name: &'static str,
    },

    /// 包装消息或映射条目缺失必需字段，且目标类型不提供默认值。
    #[error("field {field_number} missing and `{type_name}` has no default value")]
    MissingField {
        /// 缺失的字段号。
        field_number: u32,
        /// 目标类型名。
        type_name: &'static str,
    },

    /// 平面缓冲剩余空间不足，写入被拒绝且不提交任何部分字节。
    #[error("out of space: requested {requested} bytes, {remaining} remaining")]
    OutOfSpace {
        /// 本次写入请求的字节数。
        requested: usize,
        /// 写入前缓冲剩余的字节数。
        remaining: usize,
    },

    /// 预计算尺寸与实际写出字节数不一致，属于编解码器契约违例。
    #[error("codec for `{type_name}` computed {calculated} bytes but wrote {written}")]
    SizeMismatch {
        /// 值类型名。
        type_name: &'static str,
        /// `calculate_size` 的结果。
        calculated: usize,
        /// 实际写出字节数。
        written: usize,
    },

    /// 重复字段含有缺席元素（如 `Vec<Option<T>>` 中的 `None`）。
    ///
    /// 协议没有"空元素"的表示，静默丢弃会改变元素个数与下标，因此整条写入被拒绝。
    #[error("element {index} of repeated `{type_name}` is absent and cannot be encoded")]
    AbsentElement {
        /// 首个缺席元素的下标。
        index: usize,
        /// 元素类型名。
        type_name: &'static str,
    },

    /// 动态解析器没有任何规则可以为该类型构建编解码器。
    #[error("type `{type_name}` is not registered and cannot be resolved dynamically")]
    UnregisteredType {
        /// 请求解析的类型名。
        type_name: Cow<'static, str>,
    },

    /// 开放泛型形状映射到了与类型结构不兼容的构造器。
    #[error("open shape `{shape}` cannot be built with constructor `{constructor}`")]
    ShapeMismatch {
        /// 开放形状名。
        shape: &'static str,
        /// 构造器名。
        constructor: &'static str,
    },

    /// 缓存条目的实际类型与请求类型不符。
    #[error("registry entry for `{type_name}` holds a codec of a different type")]
    TypeMismatch {
        /// 请求的类型名。
        type_name: &'static str,
    },

    /// 调用方给出的字段/成员选择器不能解析为真实成员。
    #[error("field expression `{expression}` does not name a member of `{type_name}`")]
    InvalidFieldExpression {
        /// 原始表达式。
        expression: String,
        /// 目标消息类型名。
        type_name: &'static str,
    },

    /// 流读写失败。
    #[error("stream i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl ProtoError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedVarint => codes::MALFORMED_VARINT,
            Self::TruncatedMessage => codes::TRUNCATED_MESSAGE,
            Self::RecursionLimitExceeded { .. } => codes::RECURSION_LIMIT,
            Self::SizeLimitExceeded { .. } => codes::SIZE_LIMIT,
            Self::InvalidTag(_) => codes::INVALID_TAG,
            Self::InvalidUtf8 => codes::INVALID_UTF8,
            Self::LengthMismatch { .. } => codes::LENGTH_MISMATCH,
            Self::ValueOutOfRange { .. } => codes::VALUE_OUT_OF_RANGE,
            Self::MissingField { .. } => codes::MISSING_FIELD,
            Self::OutOfSpace { .. } => codes::OUT_OF_SPACE,
            Self::SizeMismatch { .. } => codes::SIZE_MISMATCH,
            Self::AbsentElement { .. } => codes::ABSENT_ELEMENT,
            Self::UnregisteredType { .. } => codes::UNREGISTERED_TYPE,
            Self::ShapeMismatch { .. } => codes::SHAPE_MISMATCH,
            Self::TypeMismatch { .. } => codes::TYPE_MISMATCH,
            Self::InvalidFieldExpression { .. } => codes::INVALID_FIELD_EXPRESSION,
            Self::Io(_) => codes::IO,
        }
    }

    /// 是否属于输入数据损坏一类的解码错误。
    ///
    /// 调用方据此区分"丢弃该条输入"与"修复调用代码"。
    pub fn is_corrupt_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint
                | Self::TruncatedMessage
                | Self::RecursionLimitExceeded { .. }
                | Self::SizeLimitExceeded { .. }
                | Self::InvalidTag(_)
                | Self::InvalidUtf8
                | Self::LengthMismatch { .. }
                | Self::ValueOutOfRange { .. }
                | Self::MissingField { .. }
        )
    }

    pub(crate) fn unregistered<T: ?Sized>() -> Self {
        Self::UnregisteredType {
            type_name: Cow::Borrowed(std::any::type_name::<T>()),
        }
    }

    /// 读流时把 `UnexpectedEof` 归一为截断错误。
    pub(crate) fn from_stream_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedMessage
        } else {
            Self::Io(err)
        }
    }
}

/// 本 crate 的结果别名。
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_prefixed() {
        let samples = [
            ProtoError::MalformedVarint,
            ProtoError::TruncatedMessage,
            ProtoError::RecursionLimitExceeded { limit: 100 },
            ProtoError::OutOfSpace {
                requested: 4,
                remaining: 1,
            },
            ProtoError::unregistered::<u128>(),
            ProtoError::InvalidFieldExpression {
                expression: "nope".into(),
                type_name: "Demo",
            },
        ];
        for err in &samples {
            assert!(err.code().starts_with("protobuf."), "{}", err.code());
        }
        assert_eq!(samples[1].code(), codes::TRUNCATED_MESSAGE);
    }

    #[test]
    fn unexpected_eof_maps_to_truncation() {
        let err = ProtoError::from_stream_read(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, ProtoError::TruncatedMessage));
        let err = ProtoError::from_stream_read(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.code(), codes::IO);
    }

    #[test]
    fn corrupt_input_classification() {
        assert!(ProtoError::MalformedVarint.is_corrupt_input());
        assert!(!ProtoError::unregistered::<u128>().is_corrupt_input());
        let absent = ProtoError::AbsentElement {
            index: 1,
            type_name: "i32",
        };
        assert!(!absent.is_corrupt_input());
        assert_eq!(absent.code(), codes::ABSENT_ELEMENT);
    }
}
