//! State Configuration
//!
//! Defines runtime limits for a Moon VM state.
//! Configuration specifies constraints only; enforcement is handled by the state.

/// VM state configuration
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Maximum number of live operand stack slots
    pub max_stack_size: usize,

    /// Maximum nesting of native calls
    pub max_call_depth: usize,

    /// Install `package`, `package.loaded` and `require` on creation
    pub open_package: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            max_stack_size: 8000,
            max_call_depth: 200,
            open_package: true,
        }
    }
}

impl StateConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }
}
