//! 编解码性质验证
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：固定向量只能覆盖少数样本；往返、尺寸契约、打包等价、截断安全与映射顺序无关性
//!   是对任意输入都必须成立的性质，交给 Proptest 随机探索；
//! - **设计手法 (How)**：所有性质都经由公开编解码器驱动，失败时 Proptest 自动收缩到最小反例；
//! - **合同与边界 (What)**：
//!   1. 往返：`decode(encode(v)) == v`；
//!   2. 尺寸契约：`calculate_size(v) == encode(v).len()`；
//!   3. 打包与非打包编码解码结果相同；
//!   4. varint 长度与尺寸函数一致，边界值往返无损；
//!   5. 任意截断或随机字节只会返回错误，绝不 panic；
//!   6. 映射的插入顺序不影响解码结果。

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use proptest::collection::{hash_map, vec};
use proptest::prelude::*;
use spark_codec_protobuf::codec::repeated::{RepeatedReader, RepeatedWriter};
use spark_codec_protobuf::codec::scalar::{SInt64Codec, StringCodec};
use spark_codec_protobuf::wire::{
    decode_varint64, decode_zigzag64, encode_varint64, encode_zigzag64, length_size,
    varint64_size,
};
use spark_codec_protobuf::{CodecRegistry, MessageCodec, ProtoWriter};

use support::{Inventory, Phase, decode_with, encode_with};

fn phase() -> impl Strategy<Value = Phase> {
    prop_oneof![Just(Phase::Draft), Just(Phase::Active), Just(Phase::Retired)]
}

fn inventory() -> impl Strategy<Value = Inventory> {
    (
        any::<u64>(),
        "[a-z0-9 ]{0,12}",
        vec(any::<i32>(), 0..16),
        vec("[a-z]{0,6}", 0..4),
        hash_map("[a-z]{1,5}", any::<i64>(), 0..4),
        phase(),
        -1.0e9f64..1.0e9f64,
    )
        .prop_map(|(id, name, scores, tags, stock, phase, ratio)| Inventory {
            id,
            name,
            scores,
            tags,
            stock,
            phase,
            ratio,
        })
}

proptest! {
    #[test]
    fn prop_messages_round_trip_and_honour_size(value in inventory()) {
        let codec = MessageCodec::<Inventory>::new();
        let bytes = encode_with(&codec, &value);
        prop_assert_eq!(codec.calculate_size(&value), bytes.len());
        prop_assert_eq!(decode_with(&codec, &bytes).expect("解码"), value);
    }

    #[test]
    fn prop_packed_and_unpacked_decode_identically(items in vec(any::<i64>(), 0..32)) {
        let packed = RepeatedWriter::<Vec<i64>>::new(Arc::new(SInt64Codec));
        let unpacked = RepeatedWriter::<Vec<i64>>::unpacked(Arc::new(SInt64Codec));
        let reader = RepeatedReader::<Vec<i64>>::new(Arc::new(SInt64Codec));

        let packed_bytes = encode_with(&packed, &items);
        let unpacked_bytes = encode_with(&unpacked, &items);
        prop_assert_eq!(decode_with(&reader, &packed_bytes).expect("打包解码"), items.clone());
        prop_assert_eq!(decode_with(&reader, &unpacked_bytes).expect("非打包解码"), items);
    }

    #[test]
    fn prop_varints_round_trip_at_any_width(value in any::<u64>(), shift in 0u32..64) {
        let value = value >> shift;
        let mut scratch = [0u8; 10];
        let len = encode_varint64(value, &mut scratch);
        prop_assert_eq!(len, varint64_size(value));
        prop_assert_eq!(decode_varint64(&scratch[..len]).expect("解码"), (value, len));
        prop_assert_eq!(decode_zigzag64(encode_zigzag64(value as i64)), value as i64);
    }

    #[test]
    fn prop_truncation_never_panics(value in inventory(), cut in any::<prop::sample::Index>()) {
        let registry = CodecRegistry::global();
        let bytes = registry.serialize_to_vec(&value).expect("编码");
        let end = cut.index(bytes.len() + 1);
        if let Err(err) = registry.deserialize::<Inventory>(&bytes[..end]) {
            prop_assert!(err.is_corrupt_input());
        }
    }

    #[test]
    fn prop_random_bytes_never_panic(bytes in vec(any::<u8>(), 0..64)) {
        let registry = CodecRegistry::global();
        let _ = registry.deserialize::<Inventory>(&bytes);
        let _ = registry.deserialize::<Vec<String>>(&bytes);
        let _ = registry.deserialize::<HashMap<u32, String>>(&bytes);
    }

    #[test]
    fn prop_map_insertion_order_is_irrelevant(entries in vec(("[a-z]{1,4}", any::<i32>()), 0..8)) {
        let forward: HashMap<String, i32> = entries.iter().cloned().collect();
        let mut backward = HashMap::new();
        for (key, value) in entries.iter().rev() {
            backward.entry(key.clone()).or_insert(*value);
        }
        // 反向插入时保留最后一次出现，与正向 collect 的后写覆盖一致。
        let backward: HashMap<String, i32> = forward
            .keys()
            .map(|key| (key.clone(), backward[key]))
            .collect();

        let registry = CodecRegistry::global();
        let from_forward: HashMap<String, i32> =
            registry.deserialize(&registry.serialize_to_vec(&forward).expect("编码")).expect("解码");
        let from_backward: HashMap<String, i32> =
            registry.deserialize(&registry.serialize_to_vec(&backward).expect("编码")).expect("解码");
        prop_assert_eq!(&from_forward, &forward);
        prop_assert_eq!(from_forward, from_backward);
    }

    #[test]
    fn prop_strings_round_trip_as_roots(text in ".{0,24}") {
        let bytes = encode_with(&StringCodec, &text);
        prop_assert_eq!(bytes.len(), length_size(text.len()) + text.len());
        prop_assert_eq!(&bytes[bytes.len() - text.len()..], text.as_bytes());
        prop_assert_eq!(decode_with(&StringCodec, &bytes).expect("解码"), text);
    }
}
