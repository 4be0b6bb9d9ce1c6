//! 线格式原语：标签运算、varint/zigzag 编码与尺寸计算。
//!
//! # 教案式说明
//! - **意图 (Why)**：读写游标与所有类型编解码器共享同一组纯函数，保证"预计算尺寸 == 实际写出字节数"
//!   这一长度前缀的基础契约只在一处定义；
//! - **契约 (What)**：
//!   - 标签 = `(field_number << 3) | wire_type`，字段号 ≥ 1；
//!   - varint 为小端 base-128 分组，高位为续位；
//!   - zigzag 把有符号数映射为无符号数，使小幅负数在 varint 下仍然短小；
//! - **风险 (Trade-offs)**：负的 `int32` 按 64 位符号扩展编码（10 字节），以换取与其它 protobuf 实现的互通。

use crate::error::{ProtoError, Result};

/// 标签中线类型所占位数。
pub const TAG_TYPE_BITS: u32 = 3;
/// 线类型掩码。
pub const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;
/// 合法字段号上限（2^29 - 1）。
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// 32 位 varint 最大字节数。
pub const MAX_VARINT32_BYTES: usize = 5;
/// 64 位 varint 最大字节数。
pub const MAX_VARINT64_BYTES: usize = 10;

/// fixed32/float/sfixed32 的负载宽度。
pub const FIXED32_SIZE: usize = 4;
/// fixed64/double/sfixed64 的负载宽度。
pub const FIXED64_SIZE: usize = 8;
/// bool 的负载宽度。
pub const BOOL_SIZE: usize = 1;

/// 字段负载的线类型。
///
/// `StartGroup`/`EndGroup` 仅为跳过遗留分组字段而保留，编码端从不产生。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// varint 负载。
    Varint = 0,
    /// 8 字节小端负载。
    Fixed64 = 1,
    /// varint 长度 + 字节负载。
    LengthDelimited = 2,
    /// 遗留分组开始。
    StartGroup = 3,
    /// 遗留分组结束。
    EndGroup = 4,
    /// 4 字节小端负载。
    Fixed32 = 5,
}

impl WireType {
    /// 从标签低 3 位解析线类型。
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// 组合字段号与线类型。
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type as u32
}

/// 取出标签的线类型；非法线类型返回 [`ProtoError::InvalidTag`]。
pub fn tag_wire_type(tag: u32) -> Result<WireType> {
    WireType::from_bits(tag & TAG_TYPE_MASK).ok_or(ProtoError::InvalidTag(tag))
}

/// 取出标签的字段号。
pub const fn tag_field_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

/// 32 位 zigzag 编码。
pub const fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// 32 位 zigzag 解码。
pub const fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// 64 位 zigzag 编码。
pub const fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// 64 位 zigzag 解码。
pub const fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// 把 varint 编码写入 `out`，返回写出的字节数。
///
/// `out` 至少需要 [`MAX_VARINT64_BYTES`] 字节。
pub fn encode_varint64(mut value: u64, out: &mut [u8; MAX_VARINT64_BYTES]) -> usize {
    let mut index = 0;
    while value >= 0x80 {
        out[index] = (value as u8) | 0x80;
        value >>= 7;
        index += 1;
    }
    out[index] = value as u8;
    index + 1
}

/// 从切片头部解码 32 位 varint，返回 `(值, 消耗字节数)`。
///
/// 第 5 个字节仍带续位时返回 [`ProtoError::MalformedVarint`]；输入提前结束返回
/// [`ProtoError::TruncatedMessage`]。
pub fn decode_varint32(input: &[u8]) -> Result<(u32, usize)> {
    let mut result: u32 = 0;
    for index in 0..MAX_VARINT32_BYTES {
        let byte = *input.get(index).ok_or(ProtoError::TruncatedMessage)?;
        result |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((result, index + 1));
        }
    }
    Err(ProtoError::MalformedVarint)
}

/// 从切片头部解码 64 位 varint，返回 `(值, 消耗字节数)`。
pub fn decode_varint64(input: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    for index in 0..MAX_VARINT64_BYTES {
        let byte = *input.get(index).ok_or(ProtoError::TruncatedMessage)?;
        result |= u64::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((result, index + 1));
        }
    }
    Err(ProtoError::MalformedVarint)
}

/// 无符号 32 位 varint 的编码长度。
pub const fn varint32_size(value: u32) -> usize {
    if value & (u32::MAX << 7) == 0 {
        1
    } else if value & (u32::MAX << 14) == 0 {
        2
    } else if value & (u32::MAX << 21) == 0 {
        3
    } else if value & (u32::MAX << 28) == 0 {
        4
    } else {
        5
    }
}

/// 无符号 64 位 varint 的编码长度。
pub const fn varint64_size(value: u64) -> usize {
    // 每 7 个有效位占一个字节，0 也占 1 字节。
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// `int32` 负载长度；负数按 64 位符号扩展。
pub const fn int32_size(value: i32) -> usize {
    if value >= 0 {
        varint32_size(value as u32)
    } else {
        MAX_VARINT64_BYTES
    }
}

/// `int64` 负载长度。
pub const fn int64_size(value: i64) -> usize {
    varint64_size(value as u64)
}

/// `sint32` 负载长度。
pub const fn sint32_size(value: i32) -> usize {
    varint32_size(encode_zigzag32(value))
}

/// `sint64` 负载长度。
pub const fn sint64_size(value: i64) -> usize {
    varint64_size(encode_zigzag64(value))
}

/// 长度前缀的编码长度。
pub const fn length_size(length: usize) -> usize {
    varint64_size(length as u64)
}

/// 指定字段号的标签长度（线类型不影响长度）。
pub const fn tag_size(field_number: u32) -> usize {
    varint32_size(make_tag(field_number, WireType::Varint))
}

/// 字符串负载长度（含长度前缀）。
pub fn string_size(value: &str) -> usize {
    length_size(value.len()) + value.len()
}

/// 字节串负载长度（含长度前缀）。
pub fn bytes_size(value: &[u8]) -> usize {
    length_size(value.len()) + value.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut scratch = [0u8; MAX_VARINT64_BYTES];
        let len = encode_varint64(value, &mut scratch);
        scratch[..len].to_vec()
    }

    #[test]
    fn three_hundred_is_ac_02() {
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(decode_varint32(&[0xAC, 0x02]).expect("合法 varint"), (300, 2));
    }

    #[test]
    fn field_one_varint_tag_is_0x08() {
        assert_eq!(make_tag(1, WireType::Varint), 0x08);
        assert_eq!(tag_field_number(0x08), 1);
        assert_eq!(tag_wire_type(0x08).expect("合法线类型"), WireType::Varint);
    }

    #[test]
    fn boundary_values_round_trip() {
        for value in [0u64, 1, 127, 128, u64::from(u32::MAX), u64::MAX] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), varint64_size(value));
            assert_eq!(decode_varint64(&bytes).expect("round trip"), (value, bytes.len()));
        }
        let bytes = encode(u64::from(u32::MAX));
        assert_eq!(decode_varint32(&bytes).expect("u32::MAX").0, u32::MAX);
        assert_eq!(varint32_size(u32::MAX), 5);
    }

    #[test]
    fn zigzag_maps_small_negatives_to_small_values() {
        assert_eq!(encode_zigzag32(0), 0);
        assert_eq!(encode_zigzag32(-1), 1);
        assert_eq!(encode_zigzag32(1), 2);
        assert_eq!(encode_zigzag64(-2), 3);
        for value in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(decode_zigzag64(encode_zigzag64(value)), value);
        }
        for value in [i32::MIN, -1, 0, 1, i32::MAX] {
            assert_eq!(decode_zigzag32(encode_zigzag32(value)), value);
        }
    }

    #[test]
    fn overlong_varints_are_malformed() {
        let overlong32 = [0xFF; 5];
        assert!(matches!(decode_varint32(&overlong32), Err(ProtoError::MalformedVarint)));
        let overlong64 = [0xFF; 10];
        assert!(matches!(decode_varint64(&overlong64), Err(ProtoError::MalformedVarint)));
    }

    #[test]
    fn cut_varints_are_truncated() {
        assert!(matches!(decode_varint32(&[0x80]), Err(ProtoError::TruncatedMessage)));
        assert!(matches!(decode_varint64(&[]), Err(ProtoError::TruncatedMessage)));
    }

    #[test]
    fn negative_int32_is_ten_bytes() {
        assert_eq!(int32_size(-1), 10);
        assert_eq!(int32_size(1), 1);
        assert_eq!(sint32_size(-1), 1);
    }

    #[test]
    fn invalid_wire_types_are_rejected() {
        assert!(matches!(tag_wire_type(0x0E), Err(ProtoError::InvalidTag(0x0E))));
        assert!(matches!(tag_wire_type(0x0F), Err(ProtoError::InvalidTag(0x0F))));
    }
}
