//! 集成测试共用的消息夹具。
//!
//! - `Inventory` 覆盖标量、打包重复字段、字符串重复字段、映射与枚举；
//! - `Node` 是自引用链表，用于构造任意嵌套深度；
//! - `InventoryV2` 在 `Inventory` 的布局上追加了旧版本不认识的字段，用于验证未知字段跳过。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use spark_codec_protobuf::codec::map::{MapReader, MapWriter};
use spark_codec_protobuf::codec::repeated::{RepeatedReader, RepeatedWriter};
use spark_codec_protobuf::codec::scalar::{
    DoubleCodec, Fixed32Codec, Fixed64Codec, Int32Codec, Int64Codec, StringCodec, UInt32Codec,
    UInt64Codec,
};
use spark_codec_protobuf::wire::tag_field_number;
use spark_codec_protobuf::{
    EnumCodec, FieldDescriptor, MessageCodec, ProtoMessage, ProtoReader, ProtoType, ProtoWriter,
    ReaderContext, Result, TypeShape, WriterContext, proto_enum,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Draft,
    Active,
    Retired,
}

proto_enum!(Phase {
    Draft = 0,
    Active = 1,
    Retired = 2,
});

struct InventoryCodecs {
    scores_reader: RepeatedReader<Vec<i32>>,
    scores_writer: RepeatedWriter<Vec<i32>>,
    tags_reader: RepeatedReader<Vec<String>>,
    tags_writer: RepeatedWriter<Vec<String>>,
    stock_reader: MapReader<HashMap<String, i64>>,
    stock_writer: MapWriter<HashMap<String, i64>>,
}

static CODECS: LazyLock<InventoryCodecs> = LazyLock::new(|| InventoryCodecs {
    scores_reader: RepeatedReader::new(Arc::new(Int32Codec)),
    scores_writer: RepeatedWriter::new(Arc::new(Int32Codec)),
    tags_reader: RepeatedReader::new(Arc::new(StringCodec)),
    tags_writer: RepeatedWriter::new(Arc::new(StringCodec)),
    stock_reader: MapReader::new(Arc::new(StringCodec), Arc::new(Int64Codec)),
    stock_writer: MapWriter::new(Arc::new(StringCodec), Arc::new(Int64Codec)),
});

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    pub id: u64,
    pub name: String,
    pub scores: Vec<i32>,
    pub tags: Vec<String>,
    pub stock: HashMap<String, i64>,
    pub phase: Phase,
    pub ratio: f64,
}

impl ProtoMessage for Inventory {
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("id", 1),
        FieldDescriptor::new("name", 2),
        FieldDescriptor::new("scores", 3),
        FieldDescriptor::new("tags", 4),
        FieldDescriptor::new("stock", 5),
        FieldDescriptor::new("phase", 6),
        FieldDescriptor::new("ratio", 7),
    ];

    fn calculate_size(&self) -> usize {
        let codecs = &*CODECS;
        let mut size = 0;
        if UInt64Codec.should_write(&self.id) {
            size += UInt64Codec.calculate_field_size(1, &self.id);
        }
        if StringCodec.should_write(&self.name) {
            size += StringCodec.calculate_field_size(2, &self.name);
        }
        size += codecs.scores_writer.calculate_field_size(3, &self.scores);
        size += codecs.tags_writer.calculate_field_size(4, &self.tags);
        size += codecs.stock_writer.calculate_field_size(5, &self.stock);
        if EnumCodec::<Phase>::new().should_write(&self.phase) {
            size += EnumCodec::<Phase>::new().calculate_field_size(6, &self.phase);
        }
        if DoubleCodec.should_write(&self.ratio) {
            size += DoubleCodec.calculate_field_size(7, &self.ratio);
        }
        size
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        let codecs = &*CODECS;
        if UInt64Codec.should_write(&self.id) {
            UInt64Codec.write_field(ctx, 1, &self.id)?;
        }
        if StringCodec.should_write(&self.name) {
            StringCodec.write_field(ctx, 2, &self.name)?;
        }
        codecs.scores_writer.write_field(ctx, 3, &self.scores)?;
        codecs.tags_writer.write_field(ctx, 4, &self.tags)?;
        codecs.stock_writer.write_field(ctx, 5, &self.stock)?;
        if EnumCodec::<Phase>::new().should_write(&self.phase) {
            EnumCodec::<Phase>::new().write_field(ctx, 6, &self.phase)?;
        }
        if DoubleCodec.should_write(&self.ratio) {
            DoubleCodec.write_field(ctx, 7, &self.ratio)?;
        }
        Ok(())
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        let codecs = &*CODECS;
        match tag_field_number(tag) {
            1 => UInt64Codec.merge_field(ctx, &mut self.id),
            2 => StringCodec.merge_field(ctx, &mut self.name),
            3 => codecs.scores_reader.merge_field(ctx, &mut self.scores),
            4 => codecs.tags_reader.merge_field(ctx, &mut self.tags),
            5 => codecs.stock_reader.merge_field(ctx, &mut self.stock),
            6 => EnumCodec::<Phase>::new().merge_field(ctx, &mut self.phase),
            7 => DoubleCodec.merge_field(ctx, &mut self.ratio),
            _ => ctx.skip_last_field(),
        }
    }
}

impl ProtoType for Inventory {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}

/// `Inventory` 的新版本：多出字段 9..=12，其中包含旧版本从未见过的线类型组合。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InventoryV2 {
    pub base: Inventory,
    pub checksum: u64,
    pub note: String,
    pub revision: u32,
    pub flags: u32,
}

impl ProtoMessage for InventoryV2 {
    fn calculate_size(&self) -> usize {
        self.base.calculate_size()
            + Fixed64Codec.calculate_field_size(9, &self.checksum)
            + StringCodec.calculate_field_size(10, &self.note)
            + Fixed32Codec.calculate_field_size(11, &self.revision)
            + UInt32Codec.calculate_field_size(12, &self.flags)
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        self.base.write_to(ctx)?;
        Fixed64Codec.write_field(ctx, 9, &self.checksum)?;
        StringCodec.write_field(ctx, 10, &self.note)?;
        Fixed32Codec.write_field(ctx, 11, &self.revision)?;
        UInt32Codec.write_field(ctx, 12, &self.flags)
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        match tag_field_number(tag) {
            9 => Fixed64Codec.merge_field(ctx, &mut self.checksum),
            10 => StringCodec.merge_field(ctx, &mut self.note),
            11 => Fixed32Codec.merge_field(ctx, &mut self.revision),
            12 => UInt32Codec.merge_field(ctx, &mut self.flags),
            _ => self.base.merge_field(ctx, tag),
        }
    }
}

impl ProtoType for InventoryV2 {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}

/// 自引用链表节点。
#[derive(Debug, Default, PartialEq)]
pub struct Node {
    pub depth: u32,
    pub child: Option<Box<Node>>,
}

impl Node {
    /// 构造共 `levels` 个节点的链，根节点深度为 0。
    pub fn chain(levels: u32) -> Self {
        let mut current = None;
        for depth in (0..levels).rev() {
            current = Some(Box::new(Node {
                depth,
                child: current,
            }));
        }
        current.map(|node| *node).unwrap_or_default()
    }

    /// 链上的节点数。
    pub fn len(&self) -> u32 {
        let mut count = 1;
        let mut cursor = self.child.as_deref();
        while let Some(node) = cursor {
            count += 1;
            cursor = node.child.as_deref();
        }
        count
    }
}

impl ProtoMessage for Node {
    const FIELDS: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("depth", 1), FieldDescriptor::new("child", 2)];

    fn calculate_size(&self) -> usize {
        let mut size = 0;
        if UInt32Codec.should_write(&self.depth) {
            size += UInt32Codec.calculate_field_size(1, &self.depth);
        }
        if let Some(child) = &self.child {
            size += MessageCodec::<Node>::new().calculate_field_size(2, &**child);
        }
        size
    }

    fn write_to(&self, ctx: &mut WriterContext<'_>) -> Result<()> {
        if UInt32Codec.should_write(&self.depth) {
            UInt32Codec.write_field(ctx, 1, &self.depth)?;
        }
        if let Some(child) = &self.child {
            MessageCodec::<Node>::new().write_field(ctx, 2, &**child)?;
        }
        Ok(())
    }

    fn merge_field(&mut self, ctx: &mut ReaderContext<'_>, tag: u32) -> Result<()> {
        match tag_field_number(tag) {
            1 => UInt32Codec.merge_field(ctx, &mut self.depth),
            2 => {
                let mut child = self.child.take().unwrap_or_default();
                let outcome = MessageCodec::<Node>::new().merge_field(ctx, &mut *child);
                self.child = Some(child);
                outcome
            }
            _ => ctx.skip_last_field(),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut cursor = self.child.take();
        while let Some(mut node) = cursor {
            cursor = node.child.take();
        }
    }
}

impl ProtoType for Node {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::message()
    }
}

/// 包含全部字段的示例值。
pub fn sample_inventory() -> Inventory {
    let mut stock = HashMap::new();
    stock.insert("apple".to_owned(), 12);
    stock.insert("pear".to_owned(), -3);
    Inventory {
        id: 42,
        name: "depot".to_owned(),
        scores: vec![3, 270, 86_942, -1],
        tags: vec!["fresh".to_owned(), String::new()],
        stock,
        phase: Phase::Active,
        ratio: 0.25,
    }
}

/// 以显式编码器编码根值，顺带校验尺寸契约。
pub fn encode_with<T: 'static>(writer: &dyn ProtoWriter<T>, value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    let mut ctx = WriterContext::new(&mut out);
    writer.write_to(&mut ctx, value).expect("编码");
    assert_eq!(writer.calculate_size(value), out.len(), "尺寸预算必须与实际写出一致");
    out
}

/// 以显式解码器解析根值。
pub fn decode_with<T: 'static>(reader: &dyn ProtoReader<T>, bytes: &[u8]) -> Result<T> {
    let mut ctx = ReaderContext::new(bytes);
    reader.parse_root(&mut ctx)
}
