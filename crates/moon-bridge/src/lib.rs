//! Moon Bridge
//!
//! Marshals host values onto a scripting VM stack and back, registers host
//! functions as globals or `require`-able modules, and renders the live stack
//! for debugging. Everything is written against [`moon_core::StackAdapter`].

pub mod callable;
pub mod config;
pub mod error;
pub mod host;
pub mod inspect;
pub mod introspect;
pub mod marshal;
pub mod registrar;

pub use callable::{host_function, host_function_with};
pub use config::{BridgeConfig, UnsupportedPolicy};
pub use error::{BridgeError, BridgeResult};
pub use host::HostValue;
pub use inspect::{inspect_stack, print_stack, trace_stack, SlotKind, SlotReport, StackReport};
pub use introspect::{as_sequence, Indexed, Reflect};
pub use marshal::{pull_value, push_value, Marshaler};
pub use registrar::{register_global, register_module, Registrar};
