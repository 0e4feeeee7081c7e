use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use moon_bridge::{
    pull_value, push_value, BridgeConfig, BridgeError, HostValue, Indexed, Marshaler, Reflect,
};
use moon_core::{LuaState, StackAdapter};
use pretty_assertions::assert_eq;

fn round_trip(value: HostValue) -> HostValue {
    let mut state = LuaState::new();
    push_value(&mut state, &value).unwrap();
    assert_eq!(state.get_top(), 1);
    let back = pull_value(&mut state, -1).unwrap();
    assert_eq!(state.get_top(), 1);
    back
}

#[test]
fn scalars_survive_the_boundary() {
    for value in [
        HostValue::Boolean(false),
        HostValue::Integer(0),
        HostValue::Integer(i64::MIN),
        HostValue::Integer(i64::MAX),
        HostValue::Number(-2.25),
        HostValue::from("hello"),
        HostValue::from(""),
        HostValue::Bytes(vec![0xc3, 0x28]),
    ] {
        assert_eq!(round_trip(value.clone()), value);
    }
}

#[test]
fn sequence_order_maps_to_consecutive_keys() {
    let mut state = LuaState::new();
    let value = HostValue::from(vec![
        HostValue::from("a"),
        HostValue::from("b"),
        HostValue::from("c"),
    ]);
    push_value(&mut state, &value).unwrap();

    for (i, expected) in ["a", "b", "c"].iter().enumerate() {
        state.raw_geti(1, i as i64 + 1).unwrap();
        assert_eq!(state.to_bytes(-1), Some(expected.as_bytes().to_vec()));
        state.pop(1).unwrap();
    }
    state.raw_geti(1, 4).unwrap();
    assert!(state.is_nil(-1));
    assert_eq!(state.raw_len(1), 3);
}

#[test]
fn mapping_exposes_exactly_its_keys() {
    let mut state = LuaState::new();
    let value: HostValue = [("x", HostValue::from(1)), ("y", HostValue::from("s"))]
        .into_iter()
        .collect();
    push_value(&mut state, &value).unwrap();

    let mut keys = Vec::new();
    state.push_nil().unwrap();
    while state.next(1).unwrap() {
        keys.push(String::from_utf8(state.to_bytes(-2).unwrap()).unwrap());
        state.pop(1).unwrap();
    }
    keys.sort();
    assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(state.get_top(), 1);
}

#[test]
fn nested_structures_read_back() {
    let mut inner = IndexMap::new();
    inner.insert("flags".to_string(), HostValue::from(vec![HostValue::from(true)]));
    inner.insert("ratio".to_string(), HostValue::from(0.5));

    let value = HostValue::from(vec![
        HostValue::from(inner),
        HostValue::from(vec![HostValue::from(1), HostValue::from(2)]),
        HostValue::Sequence(Vec::new()),
    ]);
    assert_eq!(round_trip(value.clone()), value);
}

#[test]
fn dynamic_sequences_are_flattened() {
    let value = HostValue::dynamic(vec![10u32, 20, 30]);
    assert_eq!(
        round_trip(value),
        HostValue::from(vec![
            HostValue::from(10),
            HostValue::from(20),
            HostValue::from(30)
        ])
    );
}

#[test]
fn lenient_mapping_drops_unsupported_keys() {
    #[derive(Debug)]
    struct Handle;
    impl Reflect for Handle {}

    let value: HostValue = [("keep", HostValue::from(1)), ("drop", HostValue::dynamic(Handle))]
        .into_iter()
        .collect();

    let mut state = LuaState::new();
    assert!(push_value(&mut state, &value).is_err());
    assert_eq!(state.get_top(), 0);

    let marshaler = Marshaler::new(BridgeConfig::lenient());
    assert!(marshaler.push(&mut state, &value).unwrap());
    let back = marshaler.pull(&mut state, 1).unwrap();
    let expected: HostValue = [("keep", HostValue::from(1))].into_iter().collect();
    assert_eq!(back, expected);
}

#[derive(Debug)]
struct Ouroboros {
    me: Weak<Ouroboros>,
}

impl Reflect for Ouroboros {
    fn as_indexed(&self) -> Option<&dyn Indexed> {
        Some(self)
    }
}

impl Indexed for Ouroboros {
    fn len(&self) -> usize {
        1
    }

    fn element(&self, index: usize) -> Option<HostValue> {
        let me: Rc<dyn Reflect> = self.me.upgrade()?;
        (index == 0).then(|| HostValue::Dynamic(me))
    }
}

#[test]
fn self_referencing_dynamic_value_is_rejected() {
    let looped = Rc::new_cyclic(|me| Ouroboros { me: me.clone() });
    let value = HostValue::Dynamic(looped);

    let mut state = LuaState::new();
    state.push_integer(1).unwrap();
    let err = push_value(&mut state, &value).unwrap_err();
    assert!(matches!(err, BridgeError::CyclicStructure { .. }));
    assert_eq!(state.get_top(), 1);
}

#[test]
fn shared_dynamic_value_is_not_a_cycle() {
    let shared = HostValue::dynamic(vec![1i32]);
    let value = HostValue::from(vec![shared.clone(), shared]);
    let back = round_trip(value);
    let one = HostValue::from(vec![HostValue::from(1)]);
    assert_eq!(back, HostValue::from(vec![one.clone(), one]));
}

#[test]
fn cyclic_vm_table_fails_read_back() {
    let mut state = LuaState::new();
    state.create_table(0, 1).unwrap();
    state.push_copy(-1).unwrap();
    state.set_field(-2, "self").unwrap();

    let err = pull_value(&mut state, 1).unwrap_err();
    assert!(matches!(err, BridgeError::CyclicTable));
    assert_eq!(state.get_top(), 1);
}

#[test]
fn irregular_tables_fail_read_back() {
    let mut state = LuaState::new();

    // mixed keys
    state.create_table(1, 1).unwrap();
    state.push_integer(1).unwrap();
    state.raw_seti(-2, 1).unwrap();
    state.push_integer(2).unwrap();
    state.set_field(-2, "k").unwrap();
    assert!(matches!(pull_value(&mut state, -1), Err(BridgeError::IrregularTable)));

    // sparse
    state.create_table(0, 0).unwrap();
    state.push_boolean(true).unwrap();
    state.raw_seti(-2, 3).unwrap();
    assert!(matches!(pull_value(&mut state, -1), Err(BridgeError::IrregularTable)));

    assert_eq!(state.get_top(), 2);
}
