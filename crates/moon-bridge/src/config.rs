//! Bridge Configuration
//!
//! Marshaling and registration behaviour. Limits only; enforcement lives in
//! the marshaler and registrar.

/// What to do with a host value that has no VM representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsupportedPolicy {
    /// Fail with `BridgeError::Unsupported`
    #[default]
    Reject,
    /// Push nothing; inside a container the element is left out
    Skip,
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum container nesting, in either direction
    pub max_depth: usize,

    pub unsupported: UnsupportedPolicy,

    /// Also bind newly created module tables as globals
    pub module_global: bool,

    /// Read VM strings back as byte buffers even when they are valid UTF-8
    pub strings_as_bytes: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            max_depth: 200,
            unsupported: UnsupportedPolicy::Reject,
            module_global: false,
            strings_as_bytes: false,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproduce the silent behaviour for unrecognized values
    pub fn lenient() -> Self {
        BridgeConfig {
            unsupported: UnsupportedPolicy::Skip,
            ..Self::default()
        }
    }
}
