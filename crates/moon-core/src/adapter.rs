//! Stack Adapter
//!
//! Primitive operations a VM binding exposes to host code. Everything above this
//! trait (marshaling, registration, inspection) is written against it only.
//!
//! Indices follow the VM convention: positive indices count from the bottom of
//! the current frame starting at 1, negative indices count down from the top
//! (`-1` is the top slot). Index `0` is never valid.

use crate::error::{MoonError, MoonResult};
use crate::vm::value::ValueKind;

pub trait StackAdapter {
    /// Host function representation accepted by [`StackAdapter::push_function`]
    type Function: Clone;

    // Stack shape
    fn get_top(&self) -> i32;

    /// Set the stack top: non-negative indices are absolute depths (growing
    /// with nils), negative indices are relative to the current top.
    fn set_top(&mut self, index: i32) -> MoonResult<()>;

    /// Convert a relative index into its positive form
    fn abs_index(&self, index: i32) -> i32 {
        if index < 0 {
            self.get_top() + index + 1
        } else {
            index
        }
    }

    fn pop(&mut self, n: i32) -> MoonResult<()> {
        let top = self.get_top();
        if n < 0 || n > top {
            return Err(MoonError::StackUnderflow);
        }
        self.set_top(top - n)
    }

    // Push
    fn push_nil(&mut self) -> MoonResult<()>;
    fn push_boolean(&mut self, b: bool) -> MoonResult<()>;
    fn push_integer(&mut self, n: i64) -> MoonResult<()>;
    fn push_number(&mut self, n: f64) -> MoonResult<()>;
    fn push_string(&mut self, s: &str) -> MoonResult<()>;
    fn push_bytes(&mut self, b: &[u8]) -> MoonResult<()>;
    fn push_function(&mut self, f: Self::Function) -> MoonResult<()>;

    /// Push a copy of the value at `index`
    fn push_copy(&mut self, index: i32) -> MoonResult<()>;

    // Tables
    /// Push a new table pre-sized for `narr` array and `nrec` hash entries
    fn create_table(&mut self, narr: usize, nrec: usize) -> MoonResult<()>;

    /// Push `t[key]` where `t` is at `index` (metamethods honoured)
    fn get_field(&mut self, index: i32, key: &str) -> MoonResult<()>;

    /// Pop a value and store it as `t[key]` where `t` is at `index` (metamethods honoured)
    fn set_field(&mut self, index: i32, key: &str) -> MoonResult<()>;

    /// Push `t[n]` without metamethods
    fn raw_geti(&mut self, index: i32, n: i64) -> MoonResult<()>;

    /// Pop a value and store it as `t[n]` without metamethods
    fn raw_seti(&mut self, index: i32, n: i64) -> MoonResult<()>;

    /// Pop a key and push the next key/value pair of the table at `index`.
    /// Returns `false` (pushing nothing) once the traversal is exhausted.
    fn next(&mut self, index: i32) -> MoonResult<bool>;

    // Globals
    fn get_global(&mut self, name: &str) -> MoonResult<()>;

    /// Pop a value and bind it to global `name`
    fn set_global(&mut self, name: &str) -> MoonResult<()>;

    // Classification
    /// Kind of the value at `index`; [`ValueKind::None`] outside the live stack
    fn kind(&self, index: i32) -> ValueKind;
    fn is_native_function(&self, index: i32) -> bool;
    fn is_integer(&self, index: i32) -> bool;

    fn is_none(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::None
    }

    fn is_nil(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Nil
    }

    fn is_boolean(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Boolean
    }

    fn is_number(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Number
    }

    fn is_string(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::String
    }

    fn is_table(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Table
    }

    fn is_function(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Function
    }

    fn is_userdata(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Userdata
    }

    fn is_light_userdata(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::LightUserdata
    }

    // Conversion
    fn to_boolean(&self, index: i32) -> bool;
    fn to_integer(&self, index: i32) -> Option<i64>;
    fn to_number(&self, index: i32) -> Option<f64>;
    fn to_bytes(&self, index: i32) -> Option<Vec<u8>>;

    /// Length of a string or table border; zero for anything else
    fn raw_len(&self, index: i32) -> usize;

    /// Identity of reference values (tables, functions, userdata)
    fn to_pointer(&self, index: i32) -> Option<usize>;
}
