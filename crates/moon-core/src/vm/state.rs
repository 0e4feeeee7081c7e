//! VM State
//!
//! Reference implementation of the stack adapter: operand stack, call frames,
//! globals and the module loader table. Bytecode execution is not part of it;
//! only native functions can be called.

use std::any::Any;

use tracing::{debug, trace};

use crate::adapter::StackAdapter;
use crate::config::StateConfig;
use crate::error::{MoonError, MoonResult};

use super::stack::Stack;
use super::table::{Table, TableRef};
use super::value::{float_to_integer, Function, NativeFunction, Userdata, Value, ValueKind};

/// Global holding the module system
pub const PACKAGE_TABLE: &str = "package";

/// Field of `package` mapping module names to module tables
pub const LOADED_TABLE: &str = "loaded";

const MAX_META_CHAIN: usize = 100;

/// A single VM instance
#[derive(Debug)]
pub struct LuaState {
    config: StateConfig,
    stack: Stack,
    /// Absolute base slot of each active native call
    frames: Vec<usize>,
    globals: TableRef,
}

impl Default for LuaState {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaState {
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    pub fn with_config(config: StateConfig) -> Self {
        debug!(
            max_stack_size = config.max_stack_size,
            open_package = config.open_package,
            "creating state"
        );
        let state = LuaState {
            stack: Stack::new(config.max_stack_size),
            frames: Vec::new(),
            globals: TableRef::default(),
            config,
        };
        if state.config.open_package {
            state.open_package();
        }
        state
    }

    fn open_package(&self) {
        let package = TableRef::new(Table::with_capacity(0, 1));
        package
            .borrow_mut()
            .set_str(LOADED_TABLE, Value::Table(TableRef::default()));

        let mut globals = self.globals.borrow_mut();
        globals.set_str(PACKAGE_TABLE, Value::Table(package));
        globals.set_str("require", Value::from(NativeFunction::new(require)));
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// The global namespace table
    pub fn globals(&self) -> TableRef {
        self.globals.clone()
    }

    fn base(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    fn slot(&self, index: i32) -> Option<usize> {
        let base = self.base();
        let top = self.stack.size();
        if index > 0 {
            let slot = base + index as usize - 1;
            (slot < top).then_some(slot)
        } else if index < 0 {
            let offset = index.unsigned_abs() as usize;
            (offset <= top - base).then(|| top - offset)
        } else {
            None
        }
    }

    fn value(&self, index: i32) -> Option<&Value> {
        self.slot(index).and_then(|slot| self.stack.get(slot))
    }

    fn checked(&self, index: i32) -> MoonResult<&Value> {
        self.value(index).ok_or(MoonError::InvalidIndex(index))
    }

    fn table_at(&self, index: i32) -> MoonResult<TableRef> {
        match self.checked(index)? {
            Value::Table(t) => Ok(t.clone()),
            other => Err(MoonError::NotATable {
                index,
                found: other.kind(),
            }),
        }
    }

    /// Clone of the value at `index`
    pub fn value_at(&self, index: i32) -> Option<Value> {
        self.value(index).cloned()
    }

    pub fn push_value(&mut self, value: Value) -> MoonResult<()> {
        self.stack.push(value)
    }

    /// Pop the top value of the current frame
    pub fn pop_value(&mut self) -> MoonResult<Value> {
        if self.stack.size() <= self.base() {
            return Err(MoonError::StackUnderflow);
        }
        self.stack.pop()
    }

    pub fn push_userdata<T: Any>(&mut self, value: T) -> MoonResult<()> {
        self.stack.push(Value::Userdata(Userdata::new(value)))
    }

    pub fn push_light_userdata(&mut self, pointer: usize) -> MoonResult<()> {
        self.stack.push(Value::LightUserdata(pointer))
    }

    /// Pop a table (or nil) and install it as the metatable of the table at `index`
    pub fn set_metatable(&mut self, index: i32) -> MoonResult<()> {
        let table = self.table_at(index)?;
        let metatable = match self.pop_value()? {
            Value::Nil => None,
            Value::Table(mt) => Some(mt),
            other => {
                return Err(MoonError::ArgumentMismatch {
                    arg: 2,
                    expected: ValueKind::Table,
                    found: other.kind(),
                })
            }
        };
        table.borrow_mut().set_metatable(metatable);
        Ok(())
    }

    /// Push the metatable of the table at `index`; pushes nothing and returns
    /// `false` when it has none
    pub fn get_metatable(&mut self, index: i32) -> MoonResult<bool> {
        let table = self.table_at(index)?;
        let metatable = table.borrow().metatable();
        match metatable {
            Some(mt) => {
                self.stack.push(Value::Table(mt))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// `target[key]` following `__index`
    pub fn index_value(&mut self, target: Value, key: Value) -> MoonResult<Value> {
        let mut current = target;
        for _ in 0..MAX_META_CHAIN {
            let table = expect_table(&current)?;
            let raw = table.borrow().get(&key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            let handler = metamethod(&table, "__index");
            match handler {
                Value::Nil => return Ok(Value::Nil),
                Value::Table(_) => current = handler,
                Value::Function(_) => {
                    let mut results = self.call_value(handler, vec![current, key], 1)?;
                    return Ok(results.pop().unwrap_or_default());
                }
                other => return Err(bad_metamethod("__index", &other)),
            }
        }
        Err(MoonError::MetatableLoop)
    }

    /// `target[key] = value` following `__newindex`
    pub fn new_index(&mut self, target: Value, key: Value, value: Value) -> MoonResult<()> {
        let mut current = target;
        for _ in 0..MAX_META_CHAIN {
            let table = expect_table(&current)?;
            let present = !table.borrow().get(&key).is_nil();
            let handler = if present {
                Value::Nil
            } else {
                metamethod(&table, "__newindex")
            };
            match handler {
                Value::Nil => {
                    table.borrow_mut().set(key, value)?;
                    return Ok(());
                }
                Value::Table(_) => current = handler,
                Value::Function(_) => {
                    self.call_value(handler, vec![current, key, value], 0)?;
                    return Ok(());
                }
                other => return Err(bad_metamethod("__newindex", &other)),
            }
        }
        Err(MoonError::MetatableLoop)
    }

    /// Call the function below the top `nargs` values.
    ///
    /// The function and its arguments are replaced by its results, adjusted to
    /// `nresults` (`None` keeps every result).
    pub fn call(&mut self, nargs: usize, nresults: Option<usize>) -> MoonResult<()> {
        let top = self.stack.size();
        if nargs + 1 > top - self.base() {
            return Err(MoonError::StackUnderflow);
        }
        let func_slot = top - nargs - 1;
        let function = match self.stack.get(func_slot) {
            Some(Value::Function(Function::Native(f))) => f.clone(),
            Some(Value::Function(Function::Script(_))) => {
                return Err(MoonError::NotCallable("script function"))
            }
            Some(other) => return Err(MoonError::NotCallable(other.kind().name())),
            None => return Err(MoonError::StackUnderflow),
        };
        if self.frames.len() >= self.config.max_call_depth {
            return Err(MoonError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }

        trace!(depth = self.frames.len() + 1, nargs, "native call");
        self.frames.push(func_slot + 1);
        let outcome = function.call(self);
        self.frames.pop();

        let nret = match outcome {
            Ok(n) => n,
            Err(err) => {
                self.stack.resize(func_slot)?;
                return Err(err);
            }
        };
        let available = self.stack.size().saturating_sub(func_slot + 1);
        if nret > available {
            self.stack.resize(func_slot)?;
            return Err(MoonError::StackUnderflow);
        }

        let first_result = self.stack.size() - nret;
        let results = self.stack.split_off(first_result);
        self.stack.resize(func_slot)?;
        let wanted = nresults.unwrap_or(results.len());
        for value in results
            .into_iter()
            .chain(std::iter::repeat(Value::Nil))
            .take(wanted)
        {
            self.stack.push(value)?;
        }
        Ok(())
    }

    /// Call `function` with `args`, returning exactly `nresults` values
    pub fn call_value(
        &mut self,
        function: Value,
        args: Vec<Value>,
        nresults: usize,
    ) -> MoonResult<Vec<Value>> {
        let base = self.stack.size();
        let nargs = args.len();
        let pushed = std::iter::once(function)
            .chain(args)
            .try_for_each(|v| self.stack.push(v));
        if let Err(err) = pushed {
            self.stack.resize(base)?;
            return Err(err);
        }
        self.call(nargs, Some(nresults))?;
        Ok(self.stack.split_off(base))
    }
}

fn expect_table(value: &Value) -> MoonResult<TableRef> {
    match value {
        Value::Table(t) => Ok(t.clone()),
        other => Err(MoonError::Runtime(format!(
            "attempt to index a {} value",
            other.kind()
        ))),
    }
}

fn metamethod(table: &TableRef, event: &str) -> Value {
    let metatable = table.borrow().metatable();
    match metatable {
        Some(mt) => {
            let handler = mt.borrow().get_str(event);
            handler
        }
        None => Value::Nil,
    }
}

fn bad_metamethod(event: &str, handler: &Value) -> MoonError {
    MoonError::Runtime(format!(
        "'{}' must be a table or function, got {}",
        event,
        handler.kind()
    ))
}

/// `require(name)`: resolve a module through `package.loaded`
fn require(state: &mut LuaState) -> MoonResult<usize> {
    let name = match state.value_at(1) {
        Some(Value::String(s)) => s.to_string(),
        other => {
            return Err(MoonError::ArgumentMismatch {
                arg: 1,
                expected: ValueKind::String,
                found: other.map(|v| v.kind()).unwrap_or(ValueKind::None),
            })
        }
    };
    state.get_global(PACKAGE_TABLE)?;
    state.get_field(-1, LOADED_TABLE)?;
    state.get_field(-1, &name)?;
    if state.is_nil(-1) {
        return Err(MoonError::ModuleNotFound(name));
    }
    Ok(1)
}

impl StackAdapter for LuaState {
    type Function = NativeFunction;

    fn get_top(&self) -> i32 {
        (self.stack.size() - self.base()) as i32
    }

    fn set_top(&mut self, index: i32) -> MoonResult<()> {
        let base = self.base();
        let len = if index >= 0 {
            base + index as usize
        } else {
            let drop = (-(index + 1)) as usize;
            let top = self.stack.size();
            if drop > top - base {
                return Err(MoonError::InvalidIndex(index));
            }
            top - drop
        };
        self.stack.resize(len)
    }

    fn push_nil(&mut self) -> MoonResult<()> {
        self.stack.push(Value::Nil)
    }

    fn push_boolean(&mut self, b: bool) -> MoonResult<()> {
        self.stack.push(Value::Boolean(b))
    }

    fn push_integer(&mut self, n: i64) -> MoonResult<()> {
        self.stack.push(Value::Integer(n))
    }

    fn push_number(&mut self, n: f64) -> MoonResult<()> {
        self.stack.push(Value::Number(n))
    }

    fn push_string(&mut self, s: &str) -> MoonResult<()> {
        self.stack.push(Value::from(s))
    }

    fn push_bytes(&mut self, b: &[u8]) -> MoonResult<()> {
        self.stack.push(Value::String(b.into()))
    }

    fn push_function(&mut self, f: NativeFunction) -> MoonResult<()> {
        self.stack.push(Value::from(f))
    }

    fn push_copy(&mut self, index: i32) -> MoonResult<()> {
        let value = self.checked(index)?.clone();
        self.stack.push(value)
    }

    fn create_table(&mut self, narr: usize, nrec: usize) -> MoonResult<()> {
        self.stack
            .push(Value::Table(TableRef::new(Table::with_capacity(narr, nrec))))
    }

    fn get_field(&mut self, index: i32, key: &str) -> MoonResult<()> {
        let table = self.table_at(index)?;
        let value = self.index_value(Value::Table(table), Value::from(key))?;
        self.stack.push(value)
    }

    fn set_field(&mut self, index: i32, key: &str) -> MoonResult<()> {
        let table = self.table_at(index)?;
        let value = self.pop_value()?;
        self.new_index(Value::Table(table), Value::from(key), value)
    }

    fn raw_geti(&mut self, index: i32, n: i64) -> MoonResult<()> {
        let table = self.table_at(index)?;
        let value = table.borrow().get_int(n);
        self.stack.push(value)
    }

    fn raw_seti(&mut self, index: i32, n: i64) -> MoonResult<()> {
        let table = self.table_at(index)?;
        let value = self.pop_value()?;
        table.borrow_mut().set_int(n, value);
        Ok(())
    }

    fn next(&mut self, index: i32) -> MoonResult<bool> {
        let table = self.table_at(index)?;
        let key = self.pop_value()?;
        let entry = table.borrow().next(&key)?;
        match entry {
            Some((k, v)) => {
                self.stack.push(k)?;
                self.stack.push(v)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_global(&mut self, name: &str) -> MoonResult<()> {
        let globals = Value::Table(self.globals.clone());
        let value = self.index_value(globals, Value::from(name))?;
        self.stack.push(value)
    }

    fn set_global(&mut self, name: &str) -> MoonResult<()> {
        let value = self.pop_value()?;
        let globals = Value::Table(self.globals.clone());
        self.new_index(globals, Value::from(name), value)
    }

    fn kind(&self, index: i32) -> ValueKind {
        self.value(index).map(Value::kind).unwrap_or(ValueKind::None)
    }

    fn is_native_function(&self, index: i32) -> bool {
        matches!(self.value(index), Some(Value::Function(Function::Native(_))))
    }

    fn is_integer(&self, index: i32) -> bool {
        matches!(self.value(index), Some(Value::Integer(_)))
    }

    fn to_boolean(&self, index: i32) -> bool {
        self.value(index).map(Value::is_truthy).unwrap_or(false)
    }

    fn to_integer(&self, index: i32) -> Option<i64> {
        match self.value(index)? {
            Value::Integer(i) => Some(*i),
            Value::Number(n) => float_to_integer(*n),
            _ => None,
        }
    }

    fn to_number(&self, index: i32) -> Option<f64> {
        match self.value(index)? {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn to_bytes(&self, index: i32) -> Option<Vec<u8>> {
        match self.value(index)? {
            Value::String(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        }
    }

    fn raw_len(&self, index: i32) -> usize {
        match self.value(index) {
            Some(Value::String(s)) => s.len(),
            Some(Value::Table(t)) => t.borrow().len(),
            _ => 0,
        }
    }

    fn to_pointer(&self, index: i32) -> Option<usize> {
        self.value(index).and_then(Value::address)
    }
}
