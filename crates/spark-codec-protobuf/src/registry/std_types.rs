//! 标准库类型的形状声明。

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;

use bytes::Bytes;

use crate::collections::Stack;
use crate::registry::shape::{OpenShape, ProtoType, TypeShape};

macro_rules! registered {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ProtoType for $ty {
                fn type_shape() -> TypeShape<Self> {
                    TypeShape::Registered
                }
            }
        )+
    };
}

registered!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, Bytes);

impl<T: ProtoType> ProtoType for Vec<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::VEC)
    }
}

impl<T: ProtoType> ProtoType for VecDeque<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::VEC_DEQUE)
    }
}

impl<T: ProtoType> ProtoType for LinkedList<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::LINKED_LIST)
    }
}

impl<T: ProtoType + Eq + Hash> ProtoType for HashSet<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::HASH_SET)
    }
}

impl<T: ProtoType + Ord> ProtoType for BTreeSet<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::BTREE_SET)
    }
}

impl<T: ProtoType> ProtoType for Stack<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::sequence(OpenShape::STACK)
    }
}

impl<T: ProtoType> ProtoType for Option<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::optional()
    }
}

impl<T: ProtoType> ProtoType for Box<T> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::boxed()
    }
}

impl<T: ProtoType> ProtoType for Box<[T]> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::boxed_slice()
    }
}

impl<T: ProtoType, const N: usize> ProtoType for [T; N] {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::fixed_array()
    }
}

impl<K: ProtoType, V: ProtoType> ProtoType for (K, V) {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::pair()
    }
}

impl<K: ProtoType + Eq + Hash, V: ProtoType> ProtoType for HashMap<K, V> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::map(OpenShape::HASH_MAP)
    }
}

impl<K: ProtoType + Ord, V: ProtoType> ProtoType for BTreeMap<K, V> {
    fn type_shape() -> TypeShape<Self> {
        TypeShape::map(OpenShape::BTREE_MAP)
    }
}
