//! Host Function Adapter
//!
//! Wraps a host closure over [`HostValue`]s as a native VM function: arguments
//! are read back from the callee frame, the result is marshaled onto it.

use tracing::trace;

use moon_core::{LuaState, MoonError, NativeFunction, StackAdapter};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostValue;
use crate::marshal::Marshaler;

/// Adapt `f` with the default bridge configuration
pub fn host_function<F>(f: F) -> NativeFunction
where
    F: Fn(&[HostValue]) -> BridgeResult<Option<HostValue>> + 'static,
{
    host_function_with(BridgeConfig::default(), f)
}

pub fn host_function_with<F>(config: BridgeConfig, f: F) -> NativeFunction
where
    F: Fn(&[HostValue]) -> BridgeResult<Option<HostValue>> + 'static,
{
    let marshaler = Marshaler::new(config);
    NativeFunction::new(move |state: &mut LuaState| {
        invoke(&marshaler, state, &f).map_err(into_vm_error)
    })
}

fn invoke<F>(marshaler: &Marshaler, state: &mut LuaState, f: &F) -> BridgeResult<usize>
where
    F: Fn(&[HostValue]) -> BridgeResult<Option<HostValue>>,
{
    let nargs = state.get_top();
    let args = (1..=nargs)
        .map(|index| marshaler.pull(state, index))
        .collect::<BridgeResult<Vec<_>>>()?;
    trace!(nargs, "calling host function");

    let pushed = match f(&args)? {
        Some(result) => marshaler.push(state, &result)?,
        None => false,
    };
    Ok(usize::from(pushed))
}

fn into_vm_error(err: BridgeError) -> MoonError {
    match err {
        BridgeError::Vm(inner) => inner,
        other => MoonError::Runtime(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moon_core::Value;

    #[test]
    fn sums_integer_arguments() {
        let sum = host_function(|args| {
            let total = args
                .iter()
                .map(|a| match a {
                    HostValue::Integer(n) => Ok(*n),
                    other => Err(BridgeError::Unsupported {
                        type_name: other.type_name().to_string(),
                    }),
                })
                .sum::<BridgeResult<i64>>()?;
            Ok(Some(HostValue::Integer(total)))
        });

        let mut state = LuaState::new();
        let results = state
            .call_value(Value::from(sum), vec![Value::from(2i64), Value::from(5i64)], 1)
            .unwrap();
        assert_eq!(results, vec![Value::Integer(7)]);
    }

    #[test]
    fn bridge_errors_become_runtime_errors() {
        let fail = host_function(|_| Err(BridgeError::IrregularTable));
        let mut state = LuaState::new();
        let err = state.call_value(Value::from(fail), Vec::new(), 0).unwrap_err();
        assert!(matches!(err, MoonError::Runtime(ref msg) if msg.contains("neither a sequence")));
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn nil_argument_is_rejected() {
        let echo = host_function(|args| Ok(args.first().cloned()));
        let mut state = LuaState::new();
        let err = state.call_value(Value::from(echo), vec![Value::Nil], 1).unwrap_err();
        assert!(matches!(err, MoonError::Runtime(_)));
    }
}
