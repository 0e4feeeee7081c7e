//! Value Marshaler
//!
//! Moves values across the boundary in both directions: host values are pushed
//! onto the VM stack as one VM value each, and stack slots are read back into
//! host values. Both directions leave the stack exactly as they found it on
//! failure.

use std::rc::Rc;

use hashbrown::HashSet;
use indexmap::IndexMap;
use tracing::{trace, warn};

use moon_core::{StackAdapter, ValueKind};

use crate::config::{BridgeConfig, UnsupportedPolicy};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostValue;
use crate::introspect::{self, Reflect};

#[derive(Debug, Clone, Default)]
pub struct Marshaler {
    config: BridgeConfig,
}

impl Marshaler {
    pub fn new(config: BridgeConfig) -> Self {
        Marshaler { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Push `value` as exactly one VM value.
    ///
    /// Returns `false` when nothing was pushed, which only happens for an
    /// unrecognized value under [`UnsupportedPolicy::Skip`].
    pub fn push<S>(&self, state: &mut S, value: &HostValue) -> BridgeResult<bool>
    where
        S: StackAdapter + ?Sized,
    {
        let base = state.get_top();
        let mut path = HashSet::new();
        match self.push_value(state, value, 0, &mut path) {
            Ok(pushed) => Ok(pushed),
            Err(err) => {
                state.set_top(base)?;
                Err(err)
            }
        }
    }

    fn push_value<S>(
        &self,
        state: &mut S,
        value: &HostValue,
        depth: usize,
        path: &mut HashSet<usize>,
    ) -> BridgeResult<bool>
    where
        S: StackAdapter + ?Sized,
    {
        match value {
            HostValue::Boolean(b) => state.push_boolean(*b)?,
            HostValue::Integer(n) => state.push_integer(*n)?,
            HostValue::Number(n) => state.push_number(*n)?,
            HostValue::String(s) => state.push_string(s)?,
            HostValue::Bytes(b) => state.push_bytes(b)?,
            HostValue::Sequence(items) => self.push_sequence(state, items, depth, path)?,
            HostValue::Mapping(entries) => self.push_mapping(state, entries, depth, path)?,
            HostValue::Dynamic(object) => return self.push_dynamic(state, object, depth, path),
        }
        Ok(true)
    }

    fn push_dynamic<S>(
        &self,
        state: &mut S,
        object: &Rc<dyn Reflect>,
        depth: usize,
        path: &mut HashSet<usize>,
    ) -> BridgeResult<bool>
    where
        S: StackAdapter + ?Sized,
    {
        let Some(items) = introspect::as_sequence(&**object) else {
            return self.unsupported(object.type_name());
        };
        trace!(
            type_name = object.type_name(),
            len = items.len(),
            "dynamic value is a sequence"
        );

        let identity = Rc::as_ptr(object) as *const u8 as usize;
        if !path.insert(identity) {
            return Err(BridgeError::CyclicStructure {
                type_name: object.type_name().to_string(),
            });
        }
        let result = self.push_sequence(state, &items, depth, path);
        path.remove(&identity);
        result.map(|()| true)
    }

    fn push_sequence<S>(
        &self,
        state: &mut S,
        items: &[HostValue],
        depth: usize,
        path: &mut HashSet<usize>,
    ) -> BridgeResult<()>
    where
        S: StackAdapter + ?Sized,
    {
        self.check_depth(depth)?;
        state.create_table(items.len(), 0)?;
        for (i, item) in items.iter().enumerate() {
            if self.push_value(state, item, depth + 1, path)? {
                state.raw_seti(-2, i as i64 + 1)?;
            }
        }
        Ok(())
    }

    fn push_mapping<S>(
        &self,
        state: &mut S,
        entries: &IndexMap<String, HostValue>,
        depth: usize,
        path: &mut HashSet<usize>,
    ) -> BridgeResult<()>
    where
        S: StackAdapter + ?Sized,
    {
        self.check_depth(depth)?;
        state.create_table(0, entries.len())?;
        for (key, item) in entries {
            if self.push_value(state, item, depth + 1, path)? {
                state.set_field(-2, key)?;
            }
        }
        Ok(())
    }

    fn unsupported(&self, type_name: &str) -> BridgeResult<bool> {
        match self.config.unsupported {
            UnsupportedPolicy::Reject => Err(BridgeError::Unsupported {
                type_name: type_name.to_string(),
            }),
            UnsupportedPolicy::Skip => {
                warn!(type_name, "skipping unsupported host value");
                Ok(false)
            }
        }
    }

    fn check_depth(&self, depth: usize) -> BridgeResult<()> {
        if depth >= self.config.max_depth {
            return Err(BridgeError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Read the value at `index` back into a host value, leaving the stack unchanged
    pub fn pull<S>(&self, state: &mut S, index: i32) -> BridgeResult<HostValue>
    where
        S: StackAdapter + ?Sized,
    {
        let index = state.abs_index(index);
        let base = state.get_top();
        let mut visited = HashSet::new();
        let result = self.pull_value(state, index, 0, &mut visited);
        if result.is_err() {
            state.set_top(base)?;
        }
        result
    }

    fn pull_value<S>(
        &self,
        state: &mut S,
        index: i32,
        depth: usize,
        visited: &mut HashSet<usize>,
    ) -> BridgeResult<HostValue>
    where
        S: StackAdapter + ?Sized,
    {
        let value = match state.kind(index) {
            ValueKind::Boolean => HostValue::Boolean(state.to_boolean(index)),
            ValueKind::Number => match state.to_integer(index) {
                Some(n) if state.is_integer(index) => HostValue::Integer(n),
                _ => HostValue::Number(state.to_number(index).unwrap_or_default()),
            },
            ValueKind::String => {
                let bytes = state.to_bytes(index).unwrap_or_default();
                if self.config.strings_as_bytes {
                    HostValue::Bytes(bytes)
                } else {
                    match String::from_utf8(bytes) {
                        Ok(s) => HostValue::String(s),
                        Err(err) => HostValue::Bytes(err.into_bytes()),
                    }
                }
            }
            ValueKind::Table => self.pull_table(state, index, depth, visited)?,
            kind => return Err(BridgeError::Unrepresentable { kind }),
        };
        Ok(value)
    }

    fn pull_table<S>(
        &self,
        state: &mut S,
        index: i32,
        depth: usize,
        visited: &mut HashSet<usize>,
    ) -> BridgeResult<HostValue>
    where
        S: StackAdapter + ?Sized,
    {
        self.check_depth(depth)?;
        let identity = state.to_pointer(index);
        if let Some(id) = identity {
            if !visited.insert(id) {
                return Err(BridgeError::CyclicTable);
            }
        }

        let mut positional = Vec::new();
        let mut named = IndexMap::new();
        state.push_nil()?;
        while state.next(index)? {
            let top = state.get_top();
            let element = self.pull_value(state, top, depth + 1, visited)?;
            let key = top - 1;
            match state.kind(key) {
                ValueKind::String => {
                    let name = state.to_bytes(key).unwrap_or_default();
                    let name = String::from_utf8(name)
                        .map_err(|err| BridgeError::NonTextKey { key: err.into_bytes() })?;
                    named.insert(name, element);
                }
                ValueKind::Number if state.is_integer(key) => {
                    let position = state.to_integer(key).unwrap_or_default();
                    positional.push((position, element));
                }
                _ => return Err(BridgeError::IrregularTable),
            }
            state.pop(1)?;
        }

        if let Some(id) = identity {
            visited.remove(&id);
        }

        match (positional.is_empty(), named.is_empty()) {
            (_, true) => {
                positional.sort_by_key(|(position, _)| *position);
                let dense = positional
                    .iter()
                    .enumerate()
                    .all(|(i, (position, _))| *position == i as i64 + 1);
                if !dense {
                    return Err(BridgeError::IrregularTable);
                }
                Ok(HostValue::Sequence(
                    positional.into_iter().map(|(_, v)| v).collect(),
                ))
            }
            (true, false) => Ok(HostValue::Mapping(named)),
            (false, false) => Err(BridgeError::IrregularTable),
        }
    }
}

/// Push with the default configuration
pub fn push_value<S>(state: &mut S, value: &HostValue) -> BridgeResult<()>
where
    S: StackAdapter + ?Sized,
{
    Marshaler::default().push(state, value).map(|_| ())
}

/// Read back with the default configuration
pub fn pull_value<S>(state: &mut S, index: i32) -> BridgeResult<HostValue>
where
    S: StackAdapter + ?Sized,
{
    Marshaler::default().pull(state, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moon_core::{LuaState, LuaString, Value};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Opaque;

    impl Reflect for Opaque {}

    #[test]
    fn integers_and_floats_stay_distinct() {
        let mut state = LuaState::new();
        push_value(&mut state, &HostValue::Integer(3)).unwrap();
        push_value(&mut state, &HostValue::Number(3.0)).unwrap();
        assert!(state.is_integer(1));
        assert!(!state.is_integer(2));
        assert_eq!(pull_value(&mut state, 1).unwrap(), HostValue::Integer(3));
        assert_eq!(pull_value(&mut state, 2).unwrap(), HostValue::Number(3.0));
    }

    #[test]
    fn sequence_table_is_presized_array() {
        let mut state = LuaState::new();
        let value: HostValue = (1..=4).map(HostValue::from).collect();
        push_value(&mut state, &value).unwrap();

        let table = state.value_at(-1).and_then(|v| v.as_table().cloned()).unwrap();
        let table = table.borrow();
        assert_eq!(table.len(), 4);
        assert_eq!(table.hash_len(), 0);
        assert!(table.array_capacity() >= 4);
    }

    #[test]
    fn mapping_table_is_presized_hash() {
        let mut state = LuaState::new();
        let value: HostValue = [
            ("a", HostValue::from(1)),
            ("b", HostValue::from(2)),
            ("c", HostValue::from(3)),
        ]
        .into_iter()
        .collect();
        push_value(&mut state, &value).unwrap();

        let table = state.value_at(-1).and_then(|v| v.as_table().cloned()).unwrap();
        let table = table.borrow();
        assert_eq!(table.len(), 0);
        assert_eq!(table.array_capacity(), 0);
        assert_eq!(table.hash_len(), 3);
        assert!(table.hash_capacity() >= 3);
    }

    #[test]
    fn non_utf8_keys_are_not_merged() {
        let mut state = LuaState::new();
        state.create_table(0, 2).unwrap();
        let table = state.value_at(-1).and_then(|v| v.as_table().cloned()).unwrap();
        for (key, n) in [(&b"\xff"[..], 1), (&b"\xfe"[..], 2)] {
            table
                .borrow_mut()
                .set(Value::String(LuaString::from(key)), Value::Integer(n))
                .unwrap();
        }

        let err = pull_value(&mut state, -1).unwrap_err();
        assert!(matches!(err, BridgeError::NonTextKey { ref key } if key.len() == 1));
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn unsupported_value_rejected_by_default() {
        let mut state = LuaState::new();
        let err = push_value(&mut state, &HostValue::dynamic(Opaque)).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Unsupported { ref type_name } if type_name.ends_with("Opaque")
        ));
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn unsupported_value_skipped_when_lenient() {
        let mut state = LuaState::new();
        let marshaler = Marshaler::new(BridgeConfig::lenient());
        let pushed = marshaler.push(&mut state, &HostValue::dynamic(Opaque)).unwrap();
        assert!(!pushed);
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn lenient_skip_leaves_hole_in_sequence() {
        let mut state = LuaState::new();
        let marshaler = Marshaler::new(BridgeConfig::lenient());
        let value = HostValue::Sequence(vec![
            HostValue::from("a"),
            HostValue::dynamic(Opaque),
            HostValue::from("c"),
        ]);
        assert!(marshaler.push(&mut state, &value).unwrap());
        assert_eq!(state.get_top(), 1);

        state.raw_geti(1, 2).unwrap();
        assert!(state.is_nil(-1));
        state.raw_geti(1, 3).unwrap();
        assert_eq!(state.to_bytes(-1), Some(b"c".to_vec()));
    }

    #[test]
    fn nested_failure_restores_stack() {
        let mut state = LuaState::new();
        state.push_boolean(true).unwrap();
        let value: HostValue = [(
            "inner",
            HostValue::Sequence(vec![HostValue::from(1), HostValue::dynamic(Opaque)]),
        )]
        .into_iter()
        .collect();
        assert!(push_value(&mut state, &value).is_err());
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn depth_limit_applies() {
        let mut state = LuaState::new();
        let mut value = HostValue::from(0);
        for _ in 0..4 {
            value = HostValue::Sequence(vec![value]);
        }
        let mut config = BridgeConfig::new();
        config.max_depth = 3;
        let err = Marshaler::new(config).push(&mut state, &value).unwrap_err();
        assert!(matches!(err, BridgeError::DepthExceeded { limit: 3 }));
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn non_utf8_strings_read_back_as_bytes() {
        let mut state = LuaState::new();
        state.push_bytes(&[0xff, 0x00]).unwrap();
        assert_eq!(
            pull_value(&mut state, -1).unwrap(),
            HostValue::Bytes(vec![0xff, 0x00])
        );

        state.push_string("text").unwrap();
        let mut config = BridgeConfig::new();
        config.strings_as_bytes = true;
        assert_eq!(
            Marshaler::new(config).pull(&mut state, -1).unwrap(),
            HostValue::Bytes(b"text".to_vec())
        );
    }

    #[test]
    fn nil_is_unrepresentable() {
        let mut state = LuaState::new();
        state.push_nil().unwrap();
        let err = pull_value(&mut state, -1).unwrap_err();
        assert!(matches!(err, BridgeError::Unrepresentable { kind: ValueKind::Nil }));
        assert_eq!(state.get_top(), 1);
    }
}
