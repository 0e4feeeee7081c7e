pub mod stack;
pub mod state;
pub mod table;
pub mod value;

pub use state::LuaState;
pub use table::{Table, TableRef};
pub use value::{Function, LuaString, NativeFunction, ScriptFunction, Userdata, Value, ValueKind};
