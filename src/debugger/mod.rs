mod breakpoints;
mod controller;
mod display;
mod output;
mod session;
mod stepping;
mod threads;

pub use breakpoints::{Breakpoint, BreakpointRegistry};
pub use controller::ExecutionController;
pub use display::{printf, CallSite, DisplayExpression, DisplayRegistry};
pub use output::{CapturedOutput, Output, StderrOutput};
pub use session::{DebugSession, StopContext};
pub use stepping::{RunMode, RunState, StepControl, StopReason, Verdict};
pub use threads::{SharedController, ThreadBook};

pub(crate) use breakpoints::display_file;
