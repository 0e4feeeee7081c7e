//! Moon - Core Library
//!
//! The stack adapter contract consumed by host bridges, and a reference VM
//! state implementing it.

pub mod adapter;
pub mod config;
pub mod error;
pub mod vm;

// Re-export commonly used types
pub use adapter::StackAdapter;
pub use config::StateConfig;
pub use error::{MoonError, MoonResult};
pub use vm::state::{LuaState, LOADED_TABLE, PACKAGE_TABLE};
pub use vm::value::{Function, LuaString, NativeFunction, ScriptFunction, Value, ValueKind};
pub use vm::table::{Table, TableRef};
