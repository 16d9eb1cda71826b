//! A gdb-style source-level debugger core for an event-driven interpreter.
//!
//! The interpreter reports call, line, return and exception events through
//! an adapter implementing [`frame::Frame`]; the [`ExecutionController`]
//! decides whether each one stops the program and, when it does, hands the
//! stop to a [`executor::CommandLoop`].

pub mod debugger;
pub mod error;
pub mod executor;
pub mod frame;
pub mod parser;
pub mod settings;
pub mod signals;

pub use debugger::{
    CapturedOutput, DebugSession, ExecutionController, RunState, SharedController, StopContext,
    StopReason, Verdict,
};
pub use error::{DebugError, EvalError, Result};
pub use settings::Settings;
