//! 类型形状描述。
//!
//! # 教案式说明
//! - **意图 (Why)**：注册表在首次使用时要为任意嵌套的容器类型构造编解码器，却不能在运行期反射类型结构；
//!   因此由每个类型通过 [`ProtoType::type_shape`] 自报"我是什么形状"，并附带已单态化的构造函数指针；
//! - **契约 (What)**：
//!   - [`TypeShape::Registered`]：只能命中注册表中显式登记的编解码器（内建标量即属此类）；
//!   - [`TypeShape::SelfDescribing`]：消息与代理类型，构造器不依赖注册表；
//!   - [`TypeShape::Enum`]：枚举；
//!   - [`TypeShape::Array`]：`Box<[T]>`/`[T; N]`，元素编解码器递归解析；
//!   - [`TypeShape::Generic1`]/[`TypeShape::Generic2`]：单/双类型参数的开放泛型，
//!     先查 [`OpenShape`] → [`ShapeConstructor`] 映射表，缺省时使用形状自带的回落构造器；
//! - **设计权衡 (Trade-offs)**：构造函数是普通 `fn` 指针而非闭包，`TypeShape` 因而不持有任何状态，
//!   可在任意线程按需重建。

use std::sync::Arc;

use crate::codec::enumeration::{EnumCodec, ProtoEnum};
use crate::codec::map::{MapReader, MapWriter, PairReader, PairWriter, ProtoMap};
use crate::codec::message::{MessageCodec, ProtoMessage};
use crate::codec::optional::{BoxReader, BoxWriter, OptionalReader, OptionalWriter};
use crate::codec::repeated::{ArrayReader, FixedArrayReader, ProtoSequence, RepeatedReader, RepeatedWriter};
use crate::codec::surrogate::{Surrogate, SurrogateCodec};
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::registry::CodecRegistry;

/// 开放泛型形状的名字，例如 "Vec" 之于 `Vec<T>`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpenShape(&'static str);

impl OpenShape {
    /// `Vec<T>`。
    pub const VEC: Self = Self("Vec");
    /// `VecDeque<T>`。
    pub const VEC_DEQUE: Self = Self("VecDeque");
    /// `LinkedList<T>`。
    pub const LINKED_LIST: Self = Self("LinkedList");
    /// `HashSet<T>`。
    pub const HASH_SET: Self = Self("HashSet");
    /// `BTreeSet<T>`。
    pub const BTREE_SET: Self = Self("BTreeSet");
    /// [`Stack<T>`](crate::Stack)。
    pub const STACK: Self = Self("Stack");
    /// `Option<T>`。
    pub const OPTION: Self = Self("Option");
    /// `Box<T>`。
    pub const BOX: Self = Self("Box");
    /// `HashMap<K, V>`。
    pub const HASH_MAP: Self = Self("HashMap");
    /// `BTreeMap<K, V>`。
    pub const BTREE_MAP: Self = Self("BTreeMap");
    /// `(K, V)`。
    pub const PAIR: Self = Self("Pair");

    /// 自定义开放形状。
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// 形状名。
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// 开放形状可映射到的通用构造器。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeConstructor {
    /// 按线上顺序追加的序列。
    Sequence,
    /// 追加完成后反转的序列（后进先出容器）。
    ReversedSequence,
    /// 透明可选值。
    Optional,
    /// 透明装箱。
    Boxed,
    /// 键值映射。
    Map,
    /// 单个键值对消息。
    Pair,
}

impl ShapeConstructor {
    /// 构造器名，用于错误信息。
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sequence => "Sequence",
            Self::ReversedSequence => "ReversedSequence",
            Self::Optional => "Optional",
            Self::Boxed => "Boxed",
            Self::Map => "Map",
            Self::Pair => "Pair",
        }
    }
}

/// 不依赖注册表的解码器构造函数。
pub type ReaderFactory<T> = fn() -> Arc<dyn ProtoReader<T>>;
/// 不依赖注册表的编码器构造函数。
pub type WriterFactory<T> = fn() -> Arc<dyn ProtoWriter<T>>;
/// 递归解析元素编解码器的解码器构造函数。
pub type ArrayReaderFactory<T> = fn(&CodecRegistry) -> Result<Arc<dyn ProtoReader<T>>>;
/// 递归解析元素编解码器的编码器构造函数。
pub type ArrayWriterFactory<T> = fn(&CodecRegistry) -> Result<Arc<dyn ProtoWriter<T>>>;
/// 按构造器种类构建泛型解码器。
pub type GenericReaderFactory<T> =
    fn(&CodecRegistry, ShapeConstructor) -> Result<Arc<dyn ProtoReader<T>>>;
/// 按构造器种类构建泛型编码器。
pub type GenericWriterFactory<T> =
    fn(&CodecRegistry, ShapeConstructor) -> Result<Arc<dyn ProtoWriter<T>>>;

/// 类型的结构描述。
pub enum TypeShape<T> {
    /// 只接受显式注册。
    Registered,
    /// 消息或代理类型。
    SelfDescribing {
        /// 解码器构造函数。
        reader: ReaderFactory<T>,
        /// 编码器构造函数。
        writer: WriterFactory<T>,
    },
    /// 枚举。
    Enum {
        /// 解码器构造函数。
        reader: ReaderFactory<T>,
        /// 编码器构造函数。
        writer: WriterFactory<T>,
    },
    /// 数组。
    Array {
        /// 解码器构造函数。
        reader: ArrayReaderFactory<T>,
        /// 编码器构造函数。
        writer: ArrayWriterFactory<T>,
    },
    /// 单类型参数的开放泛型。
    Generic1 {
        /// 开放形状。
        open: OpenShape,
        /// 映射表缺省时的构造器。
        fallback: Option<ShapeConstructor>,
        /// 解码器构造函数。
        reader: GenericReaderFactory<T>,
        /// 编码器构造函数。
        writer: GenericWriterFactory<T>,
    },
    /// 双类型参数的开放泛型。
    Generic2 {
        /// 开放形状。
        open: OpenShape,
        /// 映射表缺省时的构造器。
        fallback: Option<ShapeConstructor>,
        /// 解码器构造函数。
        reader: GenericReaderFactory<T>,
        /// 编码器构造函数。
        writer: GenericWriterFactory<T>,
    },
}

impl<T> TypeShape<T> {
    /// 形状类别名，用于日志。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::SelfDescribing { .. } => "self-describing",
            Self::Enum { .. } => "enum",
            Self::Array { .. } => "array",
            Self::Generic1 { .. } => "generic1",
            Self::Generic2 { .. } => "generic2",
        }
    }
}

/// 能被注册表动态解析的类型。
pub trait ProtoType: Sized + Send + Sync + 'static {
    /// 返回类型形状。
    fn type_shape() -> TypeShape<Self>;
}

fn shape_mismatch<T>(constructor: ShapeConstructor) -> ProtoError {
    ProtoError::ShapeMismatch {
        shape: std::any::type_name::<T>(),
        constructor: constructor.name(),
    }
}

fn message_reader<M: ProtoMessage>() -> Arc<dyn ProtoReader<M>> {
    Arc::new(MessageCodec::<M>::new())
}

fn message_writer<M: ProtoMessage>() -> Arc<dyn ProtoWriter<M>> {
    Arc::new(MessageCodec::<M>::new())
}

fn surrogate_reader<S: Surrogate>() -> Arc<dyn ProtoReader<S>> {
    Arc::new(SurrogateCodec::<S>::new())
}

fn surrogate_writer<S: Surrogate>() -> Arc<dyn ProtoWriter<S>> {
    Arc::new(SurrogateCodec::<S>::new())
}

fn enum_reader<E: ProtoEnum>() -> Arc<dyn ProtoReader<E>> {
    Arc::new(EnumCodec::<E>::new())
}

fn enum_writer<E: ProtoEnum>() -> Arc<dyn ProtoWriter<E>> {
    Arc::new(EnumCodec::<E>::new())
}

fn sequence_reader<C>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoReader<C>>>
where
    C: ProtoSequence,
    C::Item: ProtoType,
{
    let item = registry.reader::<C::Item>()?;
    match constructor {
        ShapeConstructor::Sequence => Ok(Arc::new(RepeatedReader::<C>::new(item))),
        ShapeConstructor::ReversedSequence => Ok(Arc::new(RepeatedReader::<C>::reversed(item))),
        other => Err(shape_mismatch::<C>(other)),
    }
}

fn sequence_writer<C>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoWriter<C>>>
where
    C: ProtoSequence,
    C::Item: ProtoType,
{
    match constructor {
        ShapeConstructor::Sequence | ShapeConstructor::ReversedSequence => {
            Ok(Arc::new(RepeatedWriter::<C>::new(registry.writer::<C::Item>()?)))
        }
        other => Err(shape_mismatch::<C>(other)),
    }
}

fn map_reader<M>(registry: &CodecRegistry, constructor: ShapeConstructor) -> Result<Arc<dyn ProtoReader<M>>>
where
    M: ProtoMap,
    M::Key: ProtoType,
    M::Value: ProtoType,
{
    match constructor {
        ShapeConstructor::Map => Ok(Arc::new(MapReader::<M>::new(
            registry.reader::<M::Key>()?,
            registry.reader::<M::Value>()?,
        ))),
        other => Err(shape_mismatch::<M>(other)),
    }
}

fn map_writer<M>(registry: &CodecRegistry, constructor: ShapeConstructor) -> Result<Arc<dyn ProtoWriter<M>>>
where
    M: ProtoMap,
    M::Key: ProtoType,
    M::Value: ProtoType,
{
    match constructor {
        ShapeConstructor::Map => Ok(Arc::new(MapWriter::<M>::new(
            registry.writer::<M::Key>()?,
            registry.writer::<M::Value>()?,
        ))),
        other => Err(shape_mismatch::<M>(other)),
    }
}

fn pair_reader<K: ProtoType, V: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoReader<(K, V)>>> {
    match constructor {
        ShapeConstructor::Pair => Ok(Arc::new(PairReader::new(
            registry.reader::<K>()?,
            registry.reader::<V>()?,
        ))),
        other => Err(shape_mismatch::<(K, V)>(other)),
    }
}

fn pair_writer<K: ProtoType, V: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoWriter<(K, V)>>> {
    match constructor {
        ShapeConstructor::Pair => Ok(Arc::new(PairWriter::new(
            registry.writer::<K>()?,
            registry.writer::<V>()?,
        ))),
        other => Err(shape_mismatch::<(K, V)>(other)),
    }
}

fn optional_reader<T: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoReader<Option<T>>>> {
    match constructor {
        ShapeConstructor::Optional => Ok(Arc::new(OptionalReader::new(registry.reader::<T>()?))),
        other => Err(shape_mismatch::<Option<T>>(other)),
    }
}

fn optional_writer<T: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoWriter<Option<T>>>> {
    match constructor {
        ShapeConstructor::Optional => Ok(Arc::new(OptionalWriter::new(registry.writer::<T>()?))),
        other => Err(shape_mismatch::<Option<T>>(other)),
    }
}

fn boxed_reader<T: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoReader<Box<T>>>> {
    match constructor {
        ShapeConstructor::Boxed => Ok(Arc::new(BoxReader::new(registry.reader::<T>()?))),
        other => Err(shape_mismatch::<Box<T>>(other)),
    }
}

fn boxed_writer<T: ProtoType>(
    registry: &CodecRegistry,
    constructor: ShapeConstructor,
) -> Result<Arc<dyn ProtoWriter<Box<T>>>> {
    match constructor {
        ShapeConstructor::Boxed => Ok(Arc::new(BoxWriter::new(registry.writer::<T>()?))),
        other => Err(shape_mismatch::<Box<T>>(other)),
    }
}

fn boxed_slice_reader<T: ProtoType>(registry: &CodecRegistry) -> Result<Arc<dyn ProtoReader<Box<[T]>>>> {
    Ok(Arc::new(ArrayReader::new(registry.reader::<T>()?)))
}

fn boxed_slice_writer<T: ProtoType>(registry: &CodecRegistry) -> Result<Arc<dyn ProtoWriter<Box<[T]>>>> {
    Ok(Arc::new(RepeatedWriter::<Box<[T]>>::new(registry.writer::<T>()?)))
}

fn fixed_array_reader<T: ProtoType, const N: usize>(
    registry: &CodecRegistry,
) -> Result<Arc<dyn ProtoReader<[T; N]>>> {
    Ok(Arc::new(FixedArrayReader::<T, N>::new(registry.reader::<T>()?)))
}

fn fixed_array_writer<T: ProtoType, const N: usize>(
    registry: &CodecRegistry,
) -> Result<Arc<dyn ProtoWriter<[T; N]>>> {
    Ok(Arc::new(RepeatedWriter::<[T; N]>::new(registry.writer::<T>()?)))
}

impl<T: Send + Sync + 'static> TypeShape<T> {
    /// 结构化消息。
    pub fn message() -> Self
    where
        T: ProtoMessage,
    {
        Self::SelfDescribing {
            reader: message_reader::<T>,
            writer: message_writer::<T>,
        }
    }

    /// 代理类型。
    pub fn surrogate() -> Self
    where
        T: Surrogate,
    {
        Self::SelfDescribing {
            reader: surrogate_reader::<T>,
            writer: surrogate_writer::<T>,
        }
    }

    /// 枚举。
    pub fn enumeration() -> Self
    where
        T: ProtoEnum,
    {
        Self::Enum {
            reader: enum_reader::<T>,
            writer: enum_writer::<T>,
        }
    }

    /// 可追加序列；`open` 未映射时按 [`ShapeConstructor::Sequence`] 构建。
    pub fn sequence(open: OpenShape) -> Self
    where
        T: ProtoSequence,
        T::Item: ProtoType,
    {
        Self::Generic1 {
            open,
            fallback: Some(ShapeConstructor::Sequence),
            reader: sequence_reader::<T>,
            writer: sequence_writer::<T>,
        }
    }

    /// 键值映射；`open` 未映射时按 [`ShapeConstructor::Map`] 构建。
    pub fn map(open: OpenShape) -> Self
    where
        T: ProtoMap,
        T::Key: ProtoType,
        T::Value: ProtoType,
    {
        Self::Generic2 {
            open,
            fallback: Some(ShapeConstructor::Map),
            reader: map_reader::<T>,
            writer: map_writer::<T>,
        }
    }
}

impl<T: ProtoType> TypeShape<Option<T>> {
    /// 透明可选值。
    pub fn optional() -> Self {
        Self::Generic1 {
            open: OpenShape::OPTION,
            fallback: None,
            reader: optional_reader::<T>,
            writer: optional_writer::<T>,
        }
    }
}

impl<T: ProtoType> TypeShape<Box<T>> {
    /// 透明装箱。
    pub fn boxed() -> Self {
        Self::Generic1 {
            open: OpenShape::BOX,
            fallback: None,
            reader: boxed_reader::<T>,
            writer: boxed_writer::<T>,
        }
    }
}

impl<T: ProtoType> TypeShape<Box<[T]>> {
    /// 变长数组。
    pub fn boxed_slice() -> Self {
        Self::Array {
            reader: boxed_slice_reader::<T>,
            writer: boxed_slice_writer::<T>,
        }
    }
}

impl<T: ProtoType, const N: usize> TypeShape<[T; N]> {
    /// 定长数组。
    pub fn fixed_array() -> Self {
        Self::Array {
            reader: fixed_array_reader::<T, N>,
            writer: fixed_array_writer::<T, N>,
        }
    }
}

impl<K: ProtoType, V: ProtoType> TypeShape<(K, V)> {
    /// 键值对消息。
    pub fn pair() -> Self {
        Self::Generic2 {
            open: OpenShape::PAIR,
            fallback: None,
            reader: pair_reader::<K, V>,
            writer: pair_writer::<K, V>,
        }
    }
}
