//! 编解码运行参数。
//!
//! # 教案式说明
//! - **意图 (Why)**：递归深度与输入尺寸是抵御恶意/损坏输入的唯一边界，需要由宿主统一配置，
//!   而不是散落在各个调用点的魔法数字；
//! - **契约 (What)**：[`CodecOptions`] 可由 `serde` 从 TOML/JSON 等配置源反序列化，缺省字段回落到
//!   [`Default`]；所有字段均为纯值，可自由克隆到每次调用；
//! - **执行逻辑 (How)**：读游标在构造时读取 `recursion_limit`/`size_limit`/`discard_unknown_fields`，
//!   流式写入适配器读取 `buffer_size`。

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 默认递归上限。
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// 流式写入适配器的默认内部缓冲大小。
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// 编解码运行参数集合。
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct CodecOptions {
    /// 嵌套消息允许的最大深度。
    pub recursion_limit: u32,
    /// 单次解码允许的最大输入字节数；默认不设限。
    pub size_limit: usize,
    /// 为 `true` 时未知字段直接丢弃，不写入 [`UnknownFields`](crate::UnknownFields)。
    pub discard_unknown_fields: bool,
    /// 流式写入适配器的内部缓冲大小。
    pub buffer_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: usize::MAX,
            discard_unknown_fields: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl CodecOptions {
    /// 设置递归上限。
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// 设置输入尺寸上限。
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }

    /// 设置是否丢弃未知字段。
    pub fn with_discard_unknown_fields(mut self, discard: bool) -> Self {
        self.discard_unknown_fields = discard;
        self
    }

    /// 设置流式写入缓冲大小；0 会被提升为 1，保证适配器总能前进。
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }
}
