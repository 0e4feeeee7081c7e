//! Type Introspector
//!
//! Decides whether an opaque host object behaves as an ordered sequence.
//! Containers opt in through [`Reflect::as_indexed`]; everything else reports
//! "not a sequence".

use std::collections::VecDeque;
use std::fmt;

use crate::host::HostValue;

/// Any host object that may be handed to the marshaler
pub trait Reflect: fmt::Debug {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Indexed view when the object is an ordered sequence
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        None
    }
}

/// Ordered container with a length and positional access
pub trait Indexed {
    fn len(&self) -> usize;

    fn element(&self, index: usize) -> Option<HostValue>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Elements of `value` in order, or `None` if it is not sequence-like
pub fn as_sequence(value: &dyn Reflect) -> Option<Vec<HostValue>> {
    let indexed = value.as_indexed()?;
    (0..indexed.len()).map(|i| indexed.element(i)).collect()
}

impl<T> Indexed for Vec<T>
where
    T: Clone + Into<HostValue>,
{
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn element(&self, index: usize) -> Option<HostValue> {
        self.get(index).cloned().map(Into::into)
    }
}

impl<T> Reflect for Vec<T>
where
    T: Clone + Into<HostValue> + fmt::Debug,
{
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        Some(self)
    }
}

impl<T> Indexed for VecDeque<T>
where
    T: Clone + Into<HostValue>,
{
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn element(&self, index: usize) -> Option<HostValue> {
        self.get(index).cloned().map(Into::into)
    }
}

impl<T> Reflect for VecDeque<T>
where
    T: Clone + Into<HostValue> + fmt::Debug,
{
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        Some(self)
    }
}

impl<T, const N: usize> Indexed for [T; N]
where
    T: Clone + Into<HostValue>,
{
    fn len(&self) -> usize {
        N
    }

    fn element(&self, index: usize) -> Option<HostValue> {
        self.get(index).cloned().map(Into::into)
    }
}

impl<T, const N: usize> Reflect for [T; N]
where
    T: Clone + Into<HostValue> + fmt::Debug,
{
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        Some(self)
    }
}

impl<T> Indexed for Box<[T]>
where
    T: Clone + Into<HostValue>,
{
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn element(&self, index: usize) -> Option<HostValue> {
        self.get(index).cloned().map(Into::into)
    }
}

impl<T> Reflect for Box<[T]>
where
    T: Clone + Into<HostValue> + fmt::Debug,
{
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        Some(self)
    }
}
