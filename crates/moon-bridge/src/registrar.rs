//! Function Registrar
//!
//! Exposes host functions to scripts, either as globals or grouped into module
//! tables that `require` resolves through `package.loaded`.

use tracing::debug;

use moon_core::{StackAdapter, LOADED_TABLE, PACKAGE_TABLE};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Default)]
pub struct Registrar {
    config: BridgeConfig,
}

impl Registrar {
    pub fn new(config: BridgeConfig) -> Self {
        Registrar { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bind `function` to global `name`, replacing any previous binding
    pub fn register_global<S>(
        &self,
        state: &mut S,
        name: &str,
        function: S::Function,
    ) -> BridgeResult<()>
    where
        S: StackAdapter + ?Sized,
    {
        balanced(state, |state| {
            state.push_function(function)?;
            state.set_global(name)?;
            debug!(name = %name, "registered global function");
            Ok(())
        })
    }

    /// Add `functions` to module `name`, creating the module table on first use.
    ///
    /// An existing module is found through the global of the same name first,
    /// then through `package.loaded`. Functions are merged into it in place,
    /// overwriting entries with the same name.
    pub fn register_module<S, I, N>(
        &self,
        state: &mut S,
        name: &str,
        functions: I,
    ) -> BridgeResult<()>
    where
        S: StackAdapter + ?Sized,
        I: IntoIterator<Item = (N, S::Function)>,
        N: AsRef<str>,
    {
        let functions = functions.into_iter();
        let hint = functions.size_hint().0;

        balanced(state, |state| {
            // [.., module?]
            state.get_global(name)?;
            let mut created = false;
            if !state.is_table(-1) {
                state.pop(1)?;
                // [.., package, loaded, module?]
                push_loaded(state)?;
                state.get_field(-1, name)?;
                if !state.is_table(-1) {
                    state.pop(1)?;
                    state.create_table(0, hint)?;
                    created = true;
                }
            }

            let mut count = 0usize;
            for (fname, function) in functions {
                state.push_function(function)?;
                state.set_field(-2, fname.as_ref())?;
                count += 1;
            }

            if created {
                state.push_copy(-1)?;
                state.set_field(-3, name)?;
                if self.config.module_global {
                    state.push_copy(-1)?;
                    state.set_global(name)?;
                }
                debug!(name = %name, functions = count, "created module");
            } else {
                debug!(name = %name, functions = count, "extended existing module");
            }
            Ok(())
        })
    }
}

/// Run `f` and put the stack back to its entry depth, whatever the outcome
fn balanced<S, T>(state: &mut S, f: impl FnOnce(&mut S) -> BridgeResult<T>) -> BridgeResult<T>
where
    S: StackAdapter + ?Sized,
{
    let base = state.get_top();
    let result = f(state);
    state.set_top(base)?;
    result
}

/// Push `package` and `package.loaded`
fn push_loaded<S>(state: &mut S) -> BridgeResult<()>
where
    S: StackAdapter + ?Sized,
{
    state.get_global(PACKAGE_TABLE)?;
    if !state.is_table(-1) {
        return Err(BridgeError::MissingRegistry { path: "package" });
    }
    state.get_field(-1, LOADED_TABLE)?;
    if !state.is_table(-1) {
        return Err(BridgeError::MissingRegistry { path: "package.loaded" });
    }
    Ok(())
}

/// Register a global with the default configuration
pub fn register_global<S>(state: &mut S, name: &str, function: S::Function) -> BridgeResult<()>
where
    S: StackAdapter + ?Sized,
{
    Registrar::default().register_global(state, name, function)
}

/// Register a module with the default configuration
pub fn register_module<S, I, N>(state: &mut S, name: &str, functions: I) -> BridgeResult<()>
where
    S: StackAdapter + ?Sized,
    I: IntoIterator<Item = (N, S::Function)>,
    N: AsRef<str>,
{
    Registrar::default().register_module(state, name, functions)
}
