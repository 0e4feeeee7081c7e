//! Runtime Value Representation
//!
//! Defines the dynamic value model held on the operand stack and in tables.
//! Reference types (tables, functions, userdata) compare by identity.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::MoonResult;
use super::state::LuaState;
use super::table::TableRef;

/// Classification of a stack slot or value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Slot outside the live stack
    None,
    Nil,
    Boolean,
    LightUserdata,
    Number,
    String,
    Table,
    Function,
    Userdata,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::None => "no value",
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::LightUserdata => "light userdata",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Function => "function",
            ValueKind::Userdata => "userdata",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable byte string, shared between stack slots and table keys
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LuaString(Rc<[u8]>);

impl LuaString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Borrow as text when the bytes are valid UTF-8
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString(Rc::from(s.as_bytes()))
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString(Rc::from(s.into_bytes()))
    }
}

impl From<&[u8]> for LuaString {
    fn from(b: &[u8]) -> Self {
        LuaString(Rc::from(b))
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(b: Vec<u8>) -> Self {
        LuaString(Rc::from(b))
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

type NativeFn = dyn Fn(&mut LuaState) -> MoonResult<usize>;

/// Host-implemented function callable from the VM.
///
/// Arguments occupy stack indices `1..=get_top()` of the callee frame. The
/// function pushes its results and returns how many it pushed.
#[derive(Clone)]
pub struct NativeFunction(Rc<NativeFn>);

impl NativeFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut LuaState) -> MoonResult<usize> + 'static,
    {
        NativeFunction(Rc::new(f))
    }

    pub fn call(&self, state: &mut LuaState) -> MoonResult<usize> {
        (self.0)(state)
    }

    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        self.address() == other.address()
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction(0x{:x})", self.address())
    }
}

/// Opaque handle to a function defined by VM code.
///
/// The state stores and classifies these but never executes them.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    chunk: Rc<str>,
}

impl ScriptFunction {
    pub fn new(chunk: &str) -> Self {
        ScriptFunction { chunk: Rc::from(chunk) }
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.chunk) as *const u8 as usize
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Native(NativeFunction),
    Script(ScriptFunction),
}

impl Function {
    pub fn is_native(&self) -> bool {
        matches!(self, Function::Native(_))
    }

    pub fn address(&self) -> usize {
        match self {
            Function::Native(f) => f.address(),
            Function::Script(f) => f.address(),
        }
    }
}

/// Full userdata: a host object owned by the VM
#[derive(Clone)]
pub struct Userdata(Rc<dyn Any>);

impl Userdata {
    pub fn new<T: Any>(value: T) -> Self {
        Userdata(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Userdata(0x{:x})", self.address())
    }
}

/// Runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(LuaString),
    Table(TableRef),
    Function(Function),
    Userdata(Userdata),
    LightUserdata(usize),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) | Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
            Value::Userdata(_) => ValueKind::Userdata,
            Value::LightUserdata(_) => ValueKind::LightUserdata,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Identity of reference values
    pub fn address(&self) -> Option<usize> {
        match self {
            Value::Table(t) => Some(t.address()),
            Value::Function(f) => Some(f.address()),
            Value::Userdata(u) => Some(u.address()),
            Value::LightUserdata(p) => Some(*p),
            _ => None,
        }
    }
}

/// Exact conversion of a float with an integral value
pub(crate) fn float_to_integer(n: f64) -> Option<i64> {
    // 2^63 is exactly representable; every float below it converts without loss
    if n.fract() == 0.0 && n >= -9_223_372_036_854_775_808.0 && n < 9_223_372_036_854_775_808.0 {
        Some(n as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(a), Value::Number(b)) | (Value::Number(b), Value::Integer(a)) => {
                float_to_integer(*b) == Some(*a)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::LightUserdata(a), Value::LightUserdata(b)) => a == b,
            (Value::Table(_), Value::Table(_))
            | (Value::Function(_), Value::Function(_))
            | (Value::Userdata(_), Value::Userdata(_)) => self.address() == other.address(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(LuaString::from(s))
    }
}

impl From<LuaString> for Value {
    fn from(s: LuaString) -> Self {
        Value::String(s)
    }
}

impl From<TableRef> for Value {
    fn from(t: TableRef) -> Self {
        Value::Table(t)
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::Function(Function::Native(f))
    }
}
