//! Moon Error Types
//!
//! Error conditions produced by the VM state and its stack adapter surface.
//! Errors are scoped strictly to stack, table and call mechanics.

use thiserror::Error;

use crate::vm::value::ValueKind;

#[derive(Debug, Error)]
pub enum MoonError {
    // Stack errors
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("invalid stack index: {0}")]
    InvalidIndex(i32),

    // Type errors
    #[error("attempt to index a {found} value (stack index {index})")]
    NotATable { index: i32, found: ValueKind },

    #[error("bad argument #{arg}: {expected} expected, got {found}")]
    ArgumentMismatch {
        arg: i32,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("table index is {0}")]
    InvalidKey(&'static str),

    #[error("invalid key to 'next'")]
    InvalidNextKey,

    // Call errors
    #[error("attempt to call a {0} value")]
    NotCallable(&'static str),

    #[error("call depth exceeded (limit {limit})")]
    CallDepthExceeded { limit: usize },

    #[error("'__index' chain too long; possible loop")]
    MetatableLoop,

    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type MoonResult<T> = Result<T, MoonError>;
