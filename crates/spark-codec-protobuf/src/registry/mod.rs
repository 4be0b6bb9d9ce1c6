//! 动态编解码器解析。
//!
//! # 教案式说明
//! - **意图 (Why)**：调用方只写 `deserialize::<HashMap<String, Vec<Order>>>(bytes)`，
//!   由注册表在首次使用时按类型形状递归拼装编解码器，并在进程内缓存复用；
//! - **契约 (What)**：
//!   - 解析顺序：精确类型缓存 → 自描述类型 → 枚举 → 数组 → 单参数泛型 → 双参数泛型；
//!     全部落空返回 [`ProtoError::UnregisteredType`]；
//!   - 每个类型的编解码器一经发布不再替换：并发首次使用时各自在锁外构建，
//!     经 `entry().or_insert_with` 发布，所有调用方拿到第一个发布者的实例；
//!   - [`CodecRegistry::register`] 是"尝试添加"，已存在时返回 `false` 且不覆盖；
//! - **执行逻辑 (How)**：缓存以 `TypeId` 为键，值为类型擦除的 `Arc<dyn ProtoReader<T>>`；
//!   取出时向下转型，失败即 [`ProtoError::TypeMismatch`]（只可能源于内部缺陷）；
//! - **风险提示 (Trade-offs)**：`DashMap` 分片守卫在构建期间绝不持有，
//!   因为构建会递归解析元素类型并可能落在同一分片上。

mod shape;
mod std_types;

pub use shape::{
    ArrayReaderFactory, ArrayWriterFactory, GenericReaderFactory, GenericWriterFactory, OpenShape,
    ProtoType, ReaderFactory, ShapeConstructor, TypeShape, WriterFactory,
};

use std::any::{Any, TypeId, type_name};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::codec::scalar::{
    BoolCodec, BytesCodec, DoubleCodec, FloatCodec, Int8Codec, Int16Codec, Int32Codec, Int64Codec,
    StringCodec, UInt8Codec, UInt16Codec, UInt32Codec, UInt64Codec,
};
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::options::CodecOptions;

/// 类型擦除后的缓存条目，实际内容为 `Arc<dyn ProtoReader<T>>` 或 `Arc<dyn ProtoWriter<T>>`。
type CodecCell = Arc<dyn Any + Send + Sync>;

/// 编解码器注册表。
pub struct CodecRegistry {
    readers: DashMap<TypeId, CodecCell>,
    writers: DashMap<TypeId, CodecCell>,
    reader_shapes: DashMap<OpenShape, ShapeConstructor>,
    writer_shapes: DashMap<OpenShape, ShapeConstructor>,
    options: CodecOptions,
}

impl CodecRegistry {
    /// 预置内建标量与标准容器映射的注册表。
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    /// 以给定运行参数构造注册表；参数作用于经由本注册表发起的全部解码调用。
    pub fn with_options(options: CodecOptions) -> Self {
        let registry = Self {
            readers: DashMap::new(),
            writers: DashMap::new(),
            reader_shapes: DashMap::new(),
            writer_shapes: DashMap::new(),
            options,
        };
        registry.register_builtins();
        registry.register_default_shapes();
        registry
    }

    /// 进程级共享注册表，首次访问时构造。
    pub fn global() -> &'static CodecRegistry {
        static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CodecRegistry::new)
    }

    /// 生效的运行参数。
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    fn register_builtins(&self) {
        self.register_codec::<bool, _>(BoolCodec);
        self.register_codec::<i8, _>(Int8Codec);
        self.register_codec::<i16, _>(Int16Codec);
        self.register_codec::<i32, _>(Int32Codec);
        self.register_codec::<i64, _>(Int64Codec);
        self.register_codec::<u8, _>(UInt8Codec);
        self.register_codec::<u16, _>(UInt16Codec);
        self.register_codec::<u32, _>(UInt32Codec);
        self.register_codec::<u64, _>(UInt64Codec);
        self.register_codec::<f32, _>(FloatCodec);
        self.register_codec::<f64, _>(DoubleCodec);
        self.register_codec::<String, _>(StringCodec);
        self.register_codec::<Vec<u8>, _>(BytesCodec);
        self.register_codec::<Bytes, _>(BytesCodec);
    }

    fn register_default_shapes(&self) {
        use ShapeConstructor::{Boxed, Map, Optional, Pair, ReversedSequence, Sequence};

        for open in [
            OpenShape::VEC,
            OpenShape::VEC_DEQUE,
            OpenShape::LINKED_LIST,
            OpenShape::HASH_SET,
            OpenShape::BTREE_SET,
        ] {
            self.register_open_shape(open, Sequence, Sequence);
        }
        self.register_open_shape(OpenShape::STACK, ReversedSequence, Sequence);
        self.register_open_shape(OpenShape::OPTION, Optional, Optional);
        self.register_open_shape(OpenShape::BOX, Boxed, Boxed);
        self.register_open_shape(OpenShape::HASH_MAP, Map, Map);
        self.register_open_shape(OpenShape::BTREE_MAP, Map, Map);
        self.register_open_shape(OpenShape::PAIR, Pair, Pair);
    }

    /// 尝试为 `T` 登记一对编解码器。
    ///
    /// 两个方向都由本次调用发布时返回 `true`；已有的条目保持不变。
    pub fn register<T: Send + Sync + 'static>(
        &self,
        reader: Arc<dyn ProtoReader<T>>,
        writer: Arc<dyn ProtoWriter<T>>,
    ) -> bool {
        let id = TypeId::of::<T>();
        let reader_added = try_publish(&self.readers, id, reader);
        let writer_added = try_publish(&self.writers, id, writer);
        reader_added && writer_added
    }

    /// 以同时实现读写两个方向的编解码器登记 `T`。
    pub fn register_codec<T, C>(&self, codec: C) -> bool
    where
        T: Send + Sync + 'static,
        C: ProtoReader<T> + ProtoWriter<T>,
    {
        let codec = Arc::new(codec);
        self.register::<T>(codec.clone(), codec)
    }

    /// 把开放形状映射到读、写两个方向的构造器，覆盖已有映射。
    ///
    /// 只影响此后首次解析的类型；已缓存的编解码器不会重建。
    pub fn register_open_shape(
        &self,
        open: OpenShape,
        reader: ShapeConstructor,
        writer: ShapeConstructor,
    ) {
        self.reader_shapes.insert(open, reader);
        self.writer_shapes.insert(open, writer);
    }

    /// `T` 是否已有缓存的解码器。
    pub fn contains<T: 'static>(&self) -> bool {
        self.readers.contains_key(&TypeId::of::<T>())
    }

    /// 解析 `T` 的解码器。
    pub fn reader<T: ProtoType>(&self) -> Result<Arc<dyn ProtoReader<T>>> {
        let id = TypeId::of::<T>();
        if let Some(cached) = lookup::<Arc<dyn ProtoReader<T>>>(&self.readers, &id, type_name::<T>()) {
            return cached;
        }
        let shape = T::type_shape();
        let kind = shape.kind();
        let built = match shape {
            TypeShape::Registered => return Err(ProtoError::unregistered::<T>()),
            TypeShape::SelfDescribing { reader, .. } | TypeShape::Enum { reader, .. } => reader(),
            TypeShape::Array { reader, .. } => reader(self)?,
            TypeShape::Generic1 {
                open,
                fallback,
                reader,
                ..
            }
            | TypeShape::Generic2 {
                open,
                fallback,
                reader,
                ..
            } => reader(self, constructor_for::<T>(&self.reader_shapes, open, fallback)?)?,
        };
        let published = publish(&self.readers, id, built);
        debug!(
            type_name = type_name::<T>(),
            shape = kind,
            direction = "reader",
            "codec built and published"
        );
        downcast::<Arc<dyn ProtoReader<T>>>(&published, type_name::<T>())
    }

    /// 解析 `T` 的编码器。
    pub fn writer<T: ProtoType>(&self) -> Result<Arc<dyn ProtoWriter<T>>> {
        let id = TypeId::of::<T>();
        if let Some(cached) = lookup::<Arc<dyn ProtoWriter<T>>>(&self.writers, &id, type_name::<T>()) {
            return cached;
        }
        let shape = T::type_shape();
        let kind = shape.kind();
        let built = match shape {
            TypeShape::Registered => return Err(ProtoError::unregistered::<T>()),
            TypeShape::SelfDescribing { writer, .. } | TypeShape::Enum { writer, .. } => writer(),
            TypeShape::Array { writer, .. } => writer(self)?,
            TypeShape::Generic1 {
                open,
                fallback,
                writer,
                ..
            }
            | TypeShape::Generic2 {
                open,
                fallback,
                writer,
                ..
            } => writer(self, constructor_for::<T>(&self.writer_shapes, open, fallback)?)?,
        };
        let published = publish(&self.writers, id, built);
        debug!(
            type_name = type_name::<T>(),
            shape = kind,
            direction = "writer",
            "codec built and published"
        );
        downcast::<Arc<dyn ProtoWriter<T>>>(&published, type_name::<T>())
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("readers", &self.readers.len())
            .field("writers", &self.writers.len())
            .field("open_shapes", &self.reader_shapes.len())
            .field("options", &self.options)
            .finish()
    }
}

fn constructor_for<T>(
    table: &DashMap<OpenShape, ShapeConstructor>,
    open: OpenShape,
    fallback: Option<ShapeConstructor>,
) -> Result<ShapeConstructor> {
    table
        .get(&open)
        .map(|entry| *entry.value())
        .or(fallback)
        .ok_or_else(ProtoError::unregistered::<T>)
}

fn lookup<C: Clone + 'static>(
    table: &DashMap<TypeId, CodecCell>,
    id: &TypeId,
    type_name: &'static str,
) -> Option<Result<C>> {
    table.get(id).map(|entry| downcast::<C>(entry.value(), type_name))
}

fn downcast<C: Clone + 'static>(cell: &CodecCell, type_name: &'static str) -> Result<C> {
    cell.downcast_ref::<C>()
        .cloned()
        .ok_or(ProtoError::TypeMismatch { type_name })
}

fn publish<C: Send + Sync + 'static>(table: &DashMap<TypeId, CodecCell>, id: TypeId, built: C) -> CodecCell {
    table
        .entry(id)
        .or_insert_with(|| Arc::new(built) as CodecCell)
        .value()
        .clone()
}

fn try_publish<C: Send + Sync + 'static>(table: &DashMap<TypeId, CodecCell>, id: TypeId, codec: C) -> bool {
    match table.entry(id) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(Arc::new(codec));
            true
        }
    }
}
