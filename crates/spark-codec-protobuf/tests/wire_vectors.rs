//! 线格式向量与端到端行为
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：用与其它 protobuf 实现逐字节比对过的固定向量锁定线格式，
//!   并覆盖递归上限、未知字段跳过、分帧字段号过滤等端到端契约；
//! - **结构说明 (How)**：全部经由公开入口（注册表与自由函数）驱动，夹具位于 `support` 模块；
//! - **合同与边界 (What)**：向量一旦变化即视为线格式回归，必须同步排查互通性。

mod support;

use std::collections::BTreeMap;

use spark_codec_protobuf::wire::{decode_varint32, encode_varint64, varint64_size};
use spark_codec_protobuf::{
    CodecOptions, CodecRegistry, Decimal, PrefixStyle, ProtoError, deserialize, serialize_to_vec,
};

use support::{Inventory, InventoryV2, Node, Phase, sample_inventory};

#[test]
fn varint_300_and_field_one_tag() {
    let mut scratch = [0u8; 10];
    let len = encode_varint64(300, &mut scratch);
    assert_eq!(&scratch[..len], &[0xAC, 0x02]);
    assert_eq!(varint64_size(300), 2);

    let registry = CodecRegistry::new();
    let wrapped = registry.serialize_to_vec(&Some(300i32)).expect("编码");
    assert_eq!(wrapped, vec![0xAC, 0x02]);

    let mut framed = Vec::new();
    registry
        .serialize_with_length_prefix(&mut framed, &300i32, PrefixStyle::Base128, 0)
        .expect("写帧");
    assert_eq!(framed, vec![0x03, 0x08, 0xAC, 0x02]);
}

#[test]
fn strict_varint32_rejects_six_bytes() {
    let err = decode_varint32(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]).expect_err("超过 5 字节");
    assert!(matches!(err, ProtoError::MalformedVarint));
    let err = decode_varint32(&[0x80, 0x80]).expect_err("中途结束");
    assert!(matches!(err, ProtoError::TruncatedMessage));
}

#[test]
fn packed_scores_match_reference_bytes() {
    let inventory = Inventory {
        scores: vec![3, 270, 86_942],
        ..Inventory::default()
    };
    let bytes = serialize_to_vec(&inventory).expect("编码");
    assert_eq!(bytes, vec![0x1A, 0x06, 0x03, 0x8E, 0x02, 0x9E, 0xA7, 0x05]);
    assert_eq!(deserialize::<Inventory>(&bytes).expect("解码"), inventory);
}

#[test]
fn full_message_round_trips_through_the_global_registry() {
    let inventory = sample_inventory();
    let bytes = serialize_to_vec(&inventory).expect("编码");
    assert_eq!(deserialize::<Inventory>(&bytes).expect("解码"), inventory);
    assert_eq!(spark_codec_protobuf::deep_clone(&inventory).expect("深拷贝"), inventory);
}

#[test]
fn scalars_are_last_write_wins_and_repeated_fields_append() {
    // id=1, scores=[5], id=2, scores=[6]
    let bytes = [0x08, 0x01, 0x1A, 0x01, 0x05, 0x08, 0x02, 0x1A, 0x01, 0x06];
    let decoded = deserialize::<Inventory>(&bytes).expect("解码");
    assert_eq!(decoded.id, 2);
    assert_eq!(decoded.scores, vec![5, 6]);
}

#[test]
fn mismatched_wire_type_is_skipped_as_unknown() {
    // name (字段 2) 以 varint 形式出现，随后是合法的 id。
    let bytes = [0x10, 0x07, 0x08, 0x09];
    let decoded = deserialize::<Inventory>(&bytes).expect("解码");
    assert_eq!(decoded.name, "");
    assert_eq!(decoded.id, 9);
}

#[test]
fn recursion_limit_bounds_nesting() {
    let registry = CodecRegistry::new();
    let bytes = registry.serialize_to_vec(&Node::chain(150)).expect("编码");
    let err = registry.deserialize::<Node>(&bytes).expect_err("超过递归上限");
    assert!(matches!(err, ProtoError::RecursionLimitExceeded { limit: 100 }));
    assert_eq!(err.code(), spark_codec_protobuf::codes::RECURSION_LIMIT);

    let relaxed = CodecOptions::default().with_recursion_limit(200);
    let decoded = registry.deserialize_with::<Node>(&bytes, &relaxed).expect("放宽上限后可解码");
    assert_eq!(decoded.len(), 150);
}

#[test]
fn unknown_fields_from_newer_producers_are_skipped() {
    let newer = InventoryV2 {
        base: sample_inventory(),
        checksum: u64::MAX,
        note: "v2 only".to_owned(),
        revision: 7,
        flags: 0,
    };
    let mut bytes = serialize_to_vec(&newer).expect("编码");
    // 追加一个字段 13 的分组：StartGroup, { 1: varint 1 }, EndGroup。
    bytes.extend_from_slice(&[0x6B, 0x08, 0x01, 0x6C]);
    let older = deserialize::<Inventory>(&bytes).expect("旧版本解码");
    assert_eq!(older, sample_inventory());
}

#[test]
fn truncated_inputs_fail_cleanly() {
    let bytes = serialize_to_vec(&sample_inventory()).expect("编码");
    for cut in 1..bytes.len() {
        if let Err(err) = deserialize::<Inventory>(&bytes[..cut]) {
            assert!(err.is_corrupt_input(), "截断输入应归类为损坏输入: {err:?}");
        }
    }
}

#[test]
fn base128_framing_with_field_five() {
    let registry = CodecRegistry::new();
    let mut stream = Vec::new();
    let first = Inventory {
        id: 1,
        phase: Phase::Retired,
        ..Inventory::default()
    };
    registry
        .serialize_with_length_prefix(&mut stream, &first, PrefixStyle::Base128, 5)
        .expect("写帧");
    assert_eq!(stream, vec![0x2A, 0x04, 0x08, 0x01, 0x30, 0x02]);

    registry
        .serialize_with_length_prefix(&mut stream, &sample_inventory(), PrefixStyle::Base128, 6)
        .expect("写帧");
    registry
        .serialize_with_length_prefix(&mut stream, &first, PrefixStyle::Base128, 5)
        .expect("写帧");

    let items: Vec<Inventory> = registry
        .deserialize_items(stream.as_slice(), PrefixStyle::Base128, 5)
        .expect("解析解码器")
        .collect::<spark_codec_protobuf::Result<_>>()
        .expect("读取全部帧");
    assert_eq!(items, vec![first.clone(), first]);
}

#[test]
fn base128_tag_without_length_is_truncation() {
    let registry = CodecRegistry::new();
    let mut stream = Vec::new();
    let first = Inventory {
        id: 1,
        ..Inventory::default()
    };
    registry
        .serialize_with_length_prefix(&mut stream, &first, PrefixStyle::Base128, 5)
        .expect("写帧");
    // 字段 5 的标签已写出，长度前缀缺失。
    stream.push(0x2A);

    let mut items = registry
        .deserialize_items::<Inventory, _>(stream.as_slice(), PrefixStyle::Base128, 5)
        .expect("解析解码器");
    assert_eq!(items.next().map(|item| item.ok()), Some(Some(first)));
    assert!(matches!(items.next(), Some(Err(ProtoError::TruncatedMessage))));
    assert!(items.next().is_none());
}

#[test]
fn optional_and_boxed_sequences_share_the_packed_layout() {
    let packed = [0x0A, 0x03, 0x01, 0x02, 0x03];
    assert_eq!(serialize_to_vec(&vec![1i32, 2, 3]).expect("编码"), packed);
    assert_eq!(
        serialize_to_vec(&vec![Some(1i32), Some(2), Some(3)]).expect("编码"),
        packed
    );
    assert_eq!(
        deserialize::<Vec<Option<i32>>>(&packed).expect("解码"),
        vec![Some(1), Some(2), Some(3)]
    );
    assert_eq!(
        deserialize::<Vec<Box<i32>>>(&packed).expect("解码"),
        vec![Box::new(1), Box::new(2), Box::new(3)]
    );

    let err = serialize_to_vec(&vec![Some(1i32), None, Some(3)]).expect_err("None 元素无线上表示");
    assert!(matches!(err, ProtoError::AbsentElement { index: 1, .. }));
}

#[test]
fn collections_frame_as_wrapped_messages() {
    let registry = CodecRegistry::new();
    let mut stream = Vec::new();
    for batch in [vec![1u32, 2], vec![], vec![300]] {
        registry
            .serialize_with_length_prefix(&mut stream, &batch, PrefixStyle::Fixed32, 0)
            .expect("写帧");
    }
    let batches: Vec<Vec<u32>> = registry
        .deserialize_items(stream.as_slice(), PrefixStyle::Fixed32, 0)
        .expect("解析解码器")
        .collect::<spark_codec_protobuf::Result<_>>()
        .expect("读取全部帧");
    assert_eq!(batches, vec![vec![1, 2], vec![], vec![300]]);
}

#[test]
fn map_entries_are_ordered_by_the_container() {
    let mut ledger = BTreeMap::new();
    ledger.insert("b".to_owned(), false);
    ledger.insert("a".to_owned(), true);
    let bytes = serialize_to_vec(&ledger).expect("编码");
    assert_eq!(
        bytes,
        vec![
            0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01, 0x0A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x00
        ]
    );
    assert_eq!(deserialize::<BTreeMap<String, bool>>(&bytes).expect("解码"), ledger);
}

#[test]
fn decimal_uses_the_bcl_layout() {
    let price = Decimal::new(-12_345, 2).expect("合法");
    let bytes = serialize_to_vec(&price).expect("编码");
    assert_eq!(bytes, vec![0x08, 0xB9, 0x60, 0x18, 0x05]);
    assert_eq!(deserialize::<Decimal>(&bytes).expect("解码"), price);
}
