//! Stack Inspector
//!
//! Read-only rendering of the live stack, top slot first.

use std::fmt;
use std::io;

use tracing::debug;

use moon_core::{StackAdapter, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Boolean,
    Number,
    String,
    Table,
    Function,
    Userdata,
    LightUserdata,
    Nil,
}

impl SlotKind {
    pub fn tag(self) -> &'static str {
        match self {
            SlotKind::Boolean => "BOOL",
            SlotKind::Number => "NUM",
            SlotKind::String => "STR",
            SlotKind::Table => "TBL",
            SlotKind::Function => "FUNC",
            SlotKind::Userdata => "USR",
            SlotKind::LightUserdata => "LUSR",
            SlotKind::Nil => "NIL",
        }
    }
}

/// One classified stack slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotReport {
    pub index: i32,
    pub kind: SlotKind,
    pub detail: Option<String>,
}

impl fmt::Display for SlotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} | {:<4} : {}", self.index, self.kind.tag(), detail),
            None => write!(f, "{} | {}", self.index, self.kind.tag()),
        }
    }
}

/// Snapshot of the stack, ordered from the top slot down to slot 1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackReport {
    pub slots: Vec<SlotReport>,
}

impl StackReport {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once("~ | TOP".to_string())
            .chain(self.slots.iter().map(ToString::to_string))
            .chain(std::iter::once("~ | BOTTOM".to_string()))
    }
}

impl fmt::Display for StackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Classify every occupied slot without touching the stack
pub fn inspect_stack<S>(state: &S) -> StackReport
where
    S: StackAdapter + ?Sized,
{
    let slots = (1..=state.get_top())
        .rev()
        .map(|index| inspect_slot(state, index))
        .collect();
    StackReport { slots }
}

fn inspect_slot<S>(state: &S, index: i32) -> SlotReport
where
    S: StackAdapter + ?Sized,
{
    let (kind, detail) = match state.kind(index) {
        ValueKind::Boolean => (SlotKind::Boolean, Some(state.to_boolean(index).to_string())),
        ValueKind::Number => {
            let detail = if state.is_integer(index) {
                state.to_integer(index).map(|n| n.to_string())
            } else {
                state.to_number(index).map(|n| format!("{:.6}", n))
            };
            (SlotKind::Number, detail)
        }
        ValueKind::String => {
            let bytes = state.to_bytes(index).unwrap_or_default();
            (SlotKind::String, Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        ValueKind::Table => (SlotKind::Table, Some(format!("Size:{}", state.raw_len(index)))),
        ValueKind::Function => {
            let origin = if state.is_native_function(index) { "native" } else { "script" };
            (SlotKind::Function, Some(origin.to_string()))
        }
        ValueKind::Userdata => (SlotKind::Userdata, None),
        ValueKind::LightUserdata => (SlotKind::LightUserdata, None),
        ValueKind::Nil | ValueKind::None => (SlotKind::Nil, None),
    };
    SlotReport { index, kind, detail }
}

/// Write the framed stack listing to `out`
pub fn print_stack<S, W>(state: &S, out: &mut W) -> io::Result<()>
where
    S: StackAdapter + ?Sized,
    W: io::Write + ?Sized,
{
    write!(out, "{}", inspect_stack(state))
}

/// Emit the stack listing through `tracing` at debug level
pub fn trace_stack<S>(state: &S)
where
    S: StackAdapter + ?Sized,
{
    for line in inspect_stack(state).lines() {
        debug!("{}", line);
    }
}
