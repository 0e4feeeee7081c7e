//! Host Values
//!
//! Values originating in the embedding process, before marshaling. The closed
//! set of shapes the VM maps directly, plus `Dynamic` for anything else; the
//! latter is resolved by the introspector.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::introspect::Reflect;

#[derive(Debug, Clone)]
pub enum HostValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Sequence(Vec<HostValue>),
    Mapping(IndexMap<String, HostValue>),
    /// Opaque host object of unknown shape
    Dynamic(Rc<dyn Reflect>),
}

impl HostValue {
    /// Wrap an arbitrary host object for introspection
    pub fn dynamic<T: Reflect + 'static>(value: T) -> Self {
        HostValue::Dynamic(Rc::new(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Boolean(_) => "bool",
            HostValue::Integer(_) => "i64",
            HostValue::Number(_) => "f64",
            HostValue::String(_) => "String",
            HostValue::Bytes(_) => "bytes",
            HostValue::Sequence(_) => "sequence",
            HostValue::Mapping(_) => "mapping",
            HostValue::Dynamic(object) => object.type_name(),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Integer(a), HostValue::Integer(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => a == b,
            (HostValue::Sequence(a), HostValue::Sequence(b)) => a == b,
            (HostValue::Mapping(a), HostValue::Mapping(b)) => a == b,
            (HostValue::Dynamic(a), HostValue::Dynamic(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HostValue {
                fn from(n: $t) -> Self {
                    HostValue::Integer(i64::from(n))
                }
            }
        )*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32);

// Wide integers stay exact while they fit in an i64 and fall back to the
// nearest float otherwise.
macro_rules! wide_integer_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HostValue {
                fn from(n: $t) -> Self {
                    match i64::try_from(n) {
                        Ok(n) => HostValue::Integer(n),
                        Err(_) => HostValue::Number(n as f64),
                    }
                }
            }
        )*
    };
}

wide_integer_from!(u64, usize, isize);

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<f32> for HostValue {
    fn from(n: f32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<&[u8]> for HostValue {
    fn from(b: &[u8]) -> Self {
        HostValue::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(b: Vec<u8>) -> Self {
        HostValue::Bytes(b)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Sequence(items)
    }
}

impl From<IndexMap<String, HostValue>> for HostValue {
    fn from(entries: IndexMap<String, HostValue>) -> Self {
        HostValue::Mapping(entries)
    }
}

impl From<HashMap<String, HostValue>> for HostValue {
    fn from(entries: HashMap<String, HostValue>) -> Self {
        HostValue::Mapping(entries.into_iter().collect())
    }
}

impl FromIterator<HostValue> for HostValue {
    fn from_iter<I: IntoIterator<Item = HostValue>>(iter: I) -> Self {
        HostValue::Sequence(iter.into_iter().collect())
    }
}

impl<K: Into<String>> FromIterator<(K, HostValue)> for HostValue {
    fn from_iter<I: IntoIterator<Item = (K, HostValue)>>(iter: I) -> Self {
        HostValue::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
