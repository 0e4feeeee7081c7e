//! VM Tables
//!
//! The single composite type of the VM: an array part for keys `1..=n` and an
//! insertion-ordered hash part for everything else.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{MoonError, MoonResult};
use super::value::{float_to_integer, LuaString, Value};

/// Normalized hash key. Floats with an integral value collapse to integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyRepr {
    Boolean(bool),
    Integer(i64),
    Float(u64),
    String(LuaString),
    Object(usize),
}

impl KeyRepr {
    fn from_value(key: &Value) -> Option<KeyRepr> {
        let repr = match key {
            Value::Nil => return None,
            Value::Boolean(b) => KeyRepr::Boolean(*b),
            Value::Integer(i) => KeyRepr::Integer(*i),
            Value::Number(n) if n.is_nan() => return None,
            Value::Number(n) => match float_to_integer(*n) {
                Some(i) => KeyRepr::Integer(i),
                None => KeyRepr::Float(n.to_bits()),
            },
            Value::String(s) => KeyRepr::String(s.clone()),
            other => KeyRepr::Object(other.address()?),
        };
        Some(repr)
    }
}

fn key_error(key: &Value) -> MoonError {
    if key.is_nil() {
        MoonError::InvalidKey("nil")
    } else {
        MoonError::InvalidKey("NaN")
    }
}

#[derive(Debug, Default)]
pub struct Table {
    array: Vec<Value>,
    // caller-visible key kept next to the value so traversal can hand it back
    hash: IndexMap<KeyRepr, (Value, Value)>,
    // hash entries whose value was cleared; kept so `next` stays valid mid-traversal
    dead: usize,
    metatable: Option<TableRef>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the array and hash parts
    pub fn with_capacity(narr: usize, nrec: usize) -> Self {
        Table {
            array: Vec::with_capacity(narr),
            hash: IndexMap::with_capacity(nrec),
            dead: 0,
            metatable: None,
        }
    }

    pub fn get(&self, key: &Value) -> Value {
        match KeyRepr::from_value(key) {
            None => Value::Nil,
            Some(KeyRepr::Integer(i)) => self.get_int(i),
            Some(repr) => self.get_hash(&repr),
        }
    }

    pub fn get_int(&self, i: i64) -> Value {
        if i >= 1 && i as u64 <= self.array.len() as u64 {
            return self.array[(i - 1) as usize].clone();
        }
        self.get_hash(&KeyRepr::Integer(i))
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get_hash(&KeyRepr::String(LuaString::from(key)))
    }

    fn get_hash(&self, repr: &KeyRepr) -> Value {
        self.hash
            .get(repr)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    /// Raw store; assigning nil removes the entry
    pub fn set(&mut self, key: Value, value: Value) -> MoonResult<()> {
        let repr = KeyRepr::from_value(&key).ok_or_else(|| key_error(&key))?;
        match repr {
            KeyRepr::Integer(i) => self.set_int(i, value),
            other => self.set_hash(other, key, value),
        }
        Ok(())
    }

    pub fn set_int(&mut self, i: i64, value: Value) {
        let len = self.array.len() as i64;
        if i >= 1 && i <= len {
            self.array[(i - 1) as usize] = value;
            if i == len {
                self.trim_array();
            }
            return;
        }
        if i == len + 1 && !value.is_nil() {
            self.array.push(value);
            self.migrate();
            return;
        }
        self.set_hash(KeyRepr::Integer(i), Value::Integer(i), value);
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        let key = LuaString::from(key);
        self.set_hash(KeyRepr::String(key.clone()), Value::String(key), value);
    }

    fn set_hash(&mut self, repr: KeyRepr, key: Value, value: Value) {
        if let Some(slot) = self.hash.get_mut(&repr) {
            match (slot.1.is_nil(), value.is_nil()) {
                (true, false) => self.dead -= 1,
                (false, true) => self.dead += 1,
                _ => {}
            }
            slot.1 = value;
            return;
        }
        if value.is_nil() {
            return;
        }
        if self.dead > 0 && self.dead * 2 >= self.hash.len() {
            self.hash.retain(|_, (_, v)| !v.is_nil());
            self.dead = 0;
        }
        self.hash.insert(repr, (key, value));
    }

    /// Pull keys `n+1, n+2, ...` out of the hash part once the array reaches them
    fn migrate(&mut self) {
        loop {
            let next = KeyRepr::Integer(self.array.len() as i64 + 1);
            match self.hash.shift_remove(&next) {
                Some((_, v)) if !v.is_nil() => self.array.push(v),
                Some(_) => {
                    self.dead -= 1;
                    break;
                }
                None => break,
            }
        }
    }

    fn trim_array(&mut self) {
        while matches!(self.array.last(), Some(Value::Nil)) {
            self.array.pop();
        }
    }

    /// Border of the array part (`#t`)
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.iter().all(Value::is_nil) && self.hash_len() == 0
    }

    /// Live entries in the hash part
    pub fn hash_len(&self) -> usize {
        self.hash.len() - self.dead
    }

    pub fn array_capacity(&self) -> usize {
        self.array.capacity()
    }

    pub fn hash_capacity(&self) -> usize {
        self.hash.capacity()
    }

    /// Entry following `key` in traversal order; `nil` starts the traversal
    pub fn next(&self, key: &Value) -> MoonResult<Option<(Value, Value)>> {
        let start = match key {
            Value::Nil => 0,
            _ => {
                let repr = KeyRepr::from_value(key).ok_or(MoonError::InvalidNextKey)?;
                let in_array = |i: i64| i >= 1 && i as u64 <= self.array.len() as u64;
                match (&repr, self.hash.get_index_of(&repr)) {
                    (KeyRepr::Integer(i), _) if in_array(*i) => *i as usize,
                    (_, Some(pos)) => self.array.len() + pos + 1,
                    // array slot trimmed away during traversal
                    (KeyRepr::Integer(i), None) if *i >= 1 => self.array.len(),
                    _ => return Err(MoonError::InvalidNextKey),
                }
            }
        };

        for pos in start..self.array.len() {
            if !self.array[pos].is_nil() {
                return Ok(Some((Value::Integer(pos as i64 + 1), self.array[pos].clone())));
            }
        }

        let from = start.saturating_sub(self.array.len());
        for pos in from..self.hash.len() {
            if let Some((_, (k, v))) = self.hash.get_index(pos) {
                if !v.is_nil() {
                    return Ok(Some((k.clone(), v.clone())));
                }
            }
        }
        Ok(None)
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }
}

/// Shared handle to a table; equality is identity
#[derive(Clone, Default)]
pub struct TableRef(Rc<RefCell<Table>>);

impl TableRef {
    pub fn new(table: Table) -> Self {
        TableRef(Rc::new(RefCell::new(table)))
    }

    pub fn borrow(&self) -> Ref<'_, Table> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Table> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table(0x{:x})", self.address())
    }
}
