//! VM Stack Implementation
//!
//! Bounded operand stack addressed by absolute slot.
//! Frame-relative indexing lives in the state.

use crate::error::{MoonError, MoonResult};
use super::value::Value;

/// VM operand stack
#[derive(Debug)]
pub struct Stack {
    values: Vec<Value>,
    max_size: usize,
}

impl Stack {
    /// Create new stack with maximum size
    pub fn new(max_size: usize) -> Self {
        Stack {
            values: Vec::new(),
            max_size,
        }
    }

    /// Push value onto stack
    pub fn push(&mut self, value: Value) -> MoonResult<()> {
        if self.values.len() >= self.max_size {
            return Err(MoonError::StackOverflow { limit: self.max_size });
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop value from stack
    pub fn pop(&mut self) -> MoonResult<Value> {
        self.values.pop().ok_or(MoonError::StackUnderflow)
    }

    /// Value at an absolute slot
    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    /// Grow with nils or shrink to exactly `len` slots
    pub fn resize(&mut self, len: usize) -> MoonResult<()> {
        if len > self.max_size {
            return Err(MoonError::StackOverflow { limit: self.max_size });
        }
        self.values.resize(len, Value::Nil);
        Ok(())
    }

    /// Remove and return every slot from `slot` upwards
    pub fn split_off(&mut self, slot: usize) -> Vec<Value> {
        if slot >= self.values.len() {
            return Vec::new();
        }
        self.values.split_off(slot)
    }

    /// Get current stack size
    pub fn size(&self) -> usize {
        self.values.len()
    }
}
