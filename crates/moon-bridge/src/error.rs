//! Bridge Error Types
//!
//! Failures raised while moving values or functions across the host/VM boundary.

use thiserror::Error;

use moon_core::{MoonError, ValueKind};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Vm(#[from] MoonError),

    // Host -> VM
    #[error("unsupported host value: {type_name}")]
    Unsupported { type_name: String },

    #[error("host value nested deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("cyclic host structure through {type_name}")]
    CyclicStructure { type_name: String },

    // VM -> host
    #[error("cannot convert a {kind} value to a host value")]
    Unrepresentable { kind: ValueKind },

    #[error("table is neither a sequence nor a string-keyed mapping")]
    IrregularTable,

    #[error("table key {key:?} is not valid UTF-8")]
    NonTextKey { key: Vec<u8> },

    #[error("table contains itself")]
    CyclicTable,

    // Registration
    #[error("module registry '{path}' is missing or not a table")]
    MissingRegistry { path: &'static str },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
