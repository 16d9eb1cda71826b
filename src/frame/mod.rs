//! The boundary with the interpreter being debugged.
//!
//! An adapter for a concrete interpreter translates its own frame objects
//! into [`Frame`] and its trace notifications into [`ExecutionEvent`]. The
//! rest of the crate only ever sees these types.

mod expr;
mod recorded;
mod repr;

pub use expr::{evaluate, truthy};
pub use recorded::RecordedFrame;
pub use repr::{type_name, SafeRepr};

use crate::error::EvalError;
use serde::{Deserialize, Serialize};

pub type Value = serde_json::Value;

pub type FrameId = u64;

pub const MAIN_THREAD: &str = "MainThread";

/// Static description of the code a frame is executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeInfo {
    pub function: String,
    pub filename: String,
    pub first_line: u32,
    /// Last source line of the function, when the adapter knows it.
    #[serde(default)]
    pub last_line: Option<u32>,
}

impl CodeInfo {
    pub fn new(function: &str, filename: &str, first_line: u32) -> Self {
        Self {
            function: function.to_string(),
            filename: filename.to_string(),
            first_line,
            last_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub type_name: String,
    #[serde(default)]
    pub value: Value,
}

/// Values the controller records on a frame so that commands run while
/// stopped can inspect them (`__return__`, `__exception__`).
#[derive(Debug, Clone, Copy)]
pub enum FrameNote<'a> {
    Return(&'a Value),
    Exception(&'a ExceptionInfo),
}

pub trait Frame {
    /// Identity of this activation; stable for the frame's lifetime.
    fn id(&self) -> FrameId;
    fn code(&self) -> &CodeInfo;
    fn line(&self) -> u32;
    /// Call depth, 0 for the outermost frame of the debugged program.
    fn depth(&self) -> usize;

    fn thread_name(&self) -> &str {
        MAIN_THREAD
    }

    /// Source text of the current line, if available.
    fn source_line(&self) -> Option<&str> {
        None
    }

    fn eval(&self, expression: &str) -> Result<Value, EvalError>;

    fn note(&mut self, _note: FrameNote<'_>) {}
}

/// True when the frame sits on the header line of a function definition.
pub fn is_def_stmt(frame: &dyn Frame) -> bool {
    frame
        .source_line()
        .map(|line| {
            let line = line.trim_start();
            line.starts_with("def ") || line.starts_with("async def ")
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Call,
    Line,
    Return,
    Exception,
}

/// One notification from the interpreter.
#[derive(Debug, Clone, Copy)]
pub enum ExecutionEvent<'a> {
    Call,
    Line,
    Return(&'a Value),
    Exception(&'a ExceptionInfo),
}

impl ExecutionEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            ExecutionEvent::Call => EventKind::Call,
            ExecutionEvent::Line => EventKind::Line,
            ExecutionEvent::Return(_) => EventKind::Return,
            ExecutionEvent::Exception(_) => EventKind::Exception,
        }
    }
}

/// What the interpreter should do with its trace callback after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirective {
    /// Keep delivering every event for this frame.
    Trace,
    /// Stop delivering line, return and exception events for this frame.
    SkipLines,
    /// Remove the trace callback altogether.
    Detach,
}
