use moon_bridge::{
    host_function, register_global, register_module, BridgeConfig, BridgeError, HostValue,
    Registrar,
};
use moon_core::{
    LuaState, MoonResult, NativeFunction, StackAdapter, StateConfig, Value, LOADED_TABLE,
    PACKAGE_TABLE,
};
use pretty_assertions::assert_eq;

fn returns(n: i64) -> NativeFunction {
    NativeFunction::new(move |state: &mut LuaState| -> MoonResult<usize> {
        state.push_integer(n)?;
        Ok(1)
    })
}

fn loaded_module(state: &mut LuaState, name: &str) -> Option<usize> {
    let base = state.get_top();
    state.get_global(PACKAGE_TABLE).unwrap();
    state.get_field(-1, LOADED_TABLE).unwrap();
    state.get_field(-1, name).unwrap();
    let identity = state.to_pointer(-1);
    state.set_top(base).unwrap();
    identity
}

fn call_field(state: &mut LuaState, module: &str, field: &str) -> Value {
    state.get_global("require").unwrap();
    state.push_string(module).unwrap();
    state.call(1, Some(1)).unwrap();
    state.get_field(-1, field).unwrap();
    state.call(0, Some(1)).unwrap();
    let result = state.value_at(-1).unwrap();
    state.pop(2).unwrap();
    result
}

#[test]
fn repeated_module_registration_reuses_one_table() {
    let mut state = LuaState::new();

    register_module(&mut state, "m", [("f", returns(1))]).unwrap();
    let first = loaded_module(&mut state, "m");
    register_module(&mut state, "m", [("f", returns(2))]).unwrap();
    assert_eq!(loaded_module(&mut state, "m"), first);
    register_module(&mut state, "m", [("g", returns(3))]).unwrap();

    assert!(first.is_some());
    assert_eq!(loaded_module(&mut state, "m"), first);
    assert_eq!(call_field(&mut state, "m", "f"), Value::Integer(2));
    assert_eq!(call_field(&mut state, "m", "g"), Value::Integer(3));
    assert_eq!(state.get_top(), 0);
}

#[test]
fn last_global_registration_wins() {
    let mut state = LuaState::new();
    register_global(&mut state, "answer", returns(41)).unwrap();
    register_global(&mut state, "answer", returns(42)).unwrap();
    assert_eq!(state.get_top(), 0);

    state.get_global("answer").unwrap();
    state.call(0, Some(1)).unwrap();
    assert_eq!(state.to_integer(-1), Some(42));
}

#[test]
fn require_resolves_registered_module() {
    let mut state = LuaState::new();
    register_module(&mut state, "mathx", [("seven", returns(7))]).unwrap();

    state.get_global("require").unwrap();
    state.push_string("mathx").unwrap();
    state.call(1, Some(1)).unwrap();
    assert!(state.is_table(-1));
    assert_eq!(state.to_pointer(-1), loaded_module(&mut state, "mathx"));

    state.get_field(-1, "seven").unwrap();
    state.call(0, Some(1)).unwrap();
    assert_eq!(state.to_integer(-1), Some(7));
}

#[test]
fn host_functions_marshal_arguments_and_results() {
    let describe = host_function(|args| {
        let entries = args
            .iter()
            .enumerate()
            .map(|(i, arg)| (format!("arg{}", i + 1), HostValue::from(arg.type_name())));
        let described: HostValue = entries.collect();
        Ok(Some(described))
    });

    let mut state = LuaState::new();
    register_module(&mut state, "util", vec![("describe".to_string(), describe)]).unwrap();

    state.get_global("require").unwrap();
    state.push_string("util").unwrap();
    state.call(1, Some(1)).unwrap();
    state.get_field(-1, "describe").unwrap();
    state.push_integer(3).unwrap();
    state.push_string("x").unwrap();
    state.call(2, Some(1)).unwrap();

    let back = moon_bridge::pull_value(&mut state, -1).unwrap();
    let expected: HostValue = [
        ("arg1", HostValue::from("i64")),
        ("arg2", HostValue::from("String")),
    ]
    .into_iter()
    .collect();
    assert_eq!(back, expected);
}

#[test]
fn module_global_binding_is_optional() {
    let mut state = LuaState::new();
    let registrar = Registrar::new(BridgeConfig {
        module_global: true,
        ..BridgeConfig::default()
    });
    registrar
        .register_module(&mut state, "m", [("f", returns(5))])
        .unwrap();

    state.get_global("m").unwrap();
    assert_eq!(state.to_pointer(-1), loaded_module(&mut state, "m"));

    // the global is now found first; package.loaded keeps the same table
    registrar
        .register_module(&mut state, "m", [("g", returns(6))])
        .unwrap();
    assert_eq!(state.to_pointer(-1), loaded_module(&mut state, "m"));
}

#[test]
fn missing_loader_table_is_reported() {
    let mut state = LuaState::with_config(StateConfig {
        open_package: false,
        ..StateConfig::default()
    });
    let err = register_module(&mut state, "m", [("f", returns(1))]).unwrap_err();
    assert!(matches!(err, BridgeError::MissingRegistry { .. }));
    assert_eq!(state.get_top(), 0);

    // globals need no registry
    register_global(&mut state, "f", returns(1)).unwrap();
    assert_eq!(state.get_top(), 0);
}
