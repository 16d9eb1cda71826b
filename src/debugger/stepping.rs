use crate::frame::{Frame, FrameId};
use std::fmt;

/// Where the controller is between events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Interacting,
    Quitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(usize),
    Step,
    Call,
    Return,
    Exception,
    Signal(String),
    Request,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Breakpoint(number) => write!(f, "breakpoint {number}"),
            StopReason::Step => write!(f, "step"),
            StopReason::Call => write!(f, "call"),
            StopReason::Return => write!(f, "return"),
            StopReason::Exception => write!(f, "exception"),
            StopReason::Signal(name) => write!(f, "signal {name}"),
            StopReason::Request => write!(f, "request"),
        }
    }
}

/// How the command loop asks the program to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Step(u32),
    Next(u32),
    /// Run until the current frame returns.
    Return,
    Quit,
}

/// Run modes for the debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Continue,
    StepInto,
    /// Stop in the frame at `depth` or any caller.
    StepOver { depth: usize },
    /// Stop when `frame` returns, or anywhere above `depth` if it unwinds.
    StepOut { frame: FrameId, depth: usize },
}

/// Step-control state: the run mode plus the `step_ignore` counter.
///
/// `step_ignore` is 0 when stop conditions apply normally, N > 0 to let N
/// more qualifying events pass, and negative while line tracing keeps the
/// controller iterating without any intent to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepControl {
    pub mode: RunMode,
    pub step_ignore: i64,
    pub stop_requested: bool,
}

impl StepControl {
    pub fn new(stop_on_entry: bool) -> Self {
        Self {
            mode: if stop_on_entry {
                RunMode::StepInto
            } else {
                RunMode::Continue
            },
            step_ignore: 0,
            stop_requested: false,
        }
    }

    /// Whether the current run mode wants to stop in `frame`.
    pub fn stop_here(&self, frame: &dyn Frame) -> bool {
        match self.mode {
            RunMode::Continue => false,
            RunMode::StepInto => true,
            RunMode::StepOver { depth } => frame.depth() <= depth,
            RunMode::StepOut { depth, .. } => frame.depth() < depth,
        }
    }

    pub fn returning_from(&self, frame: &dyn Frame) -> bool {
        matches!(self.mode, RunMode::StepOut { frame: id, .. } if id == frame.id())
    }

    /// Configure the next-event filtering for `verdict`, issued in `frame`.
    pub fn apply(&mut self, verdict: Verdict, frame: &dyn Frame, linetrace: bool) {
        match verdict {
            Verdict::Continue | Verdict::Quit => {
                if linetrace {
                    self.mode = RunMode::StepInto;
                    self.step_ignore = -1;
                } else {
                    self.mode = RunMode::Continue;
                    self.step_ignore = 0;
                }
            }
            Verdict::Step(count) => {
                self.mode = RunMode::StepInto;
                self.step_ignore = i64::from(count.saturating_sub(1));
            }
            Verdict::Next(count) => {
                self.mode = RunMode::StepOver {
                    depth: frame.depth(),
                };
                self.step_ignore = i64::from(count.saturating_sub(1));
            }
            Verdict::Return => {
                self.mode = RunMode::StepOut {
                    frame: frame.id(),
                    depth: frame.depth(),
                };
                self.step_ignore = 0;
            }
        }
    }
}
