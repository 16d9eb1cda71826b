use thiserror::Error;

/// Failure while evaluating an expression in a stopped frame.
///
/// These never abort the debugger: conditions treat them as false and
/// displays report them as "No symbol" messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("No symbol \"{0}\" in current context.")]
    NoSymbol(String),
    #[error("Syntax error in expression \"{0}\".")]
    Syntax(String),
    #[error("Type error: {0}")]
    Type(String),
}

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("No breakpoint number {0}.")]
    NoSuchBreakpoint(usize),

    #[error("No breakpoint at {file}:{line}.")]
    NoBreakpointAt { file: String, line: u32 },

    #[error("No display number {0}.")]
    NoSuchDisplay(usize),

    #[error("{0} is not a signal name I know about.")]
    UnknownSignal(String),

    #[error("Cannot change the handling of {0}.")]
    FatalSignal(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("Undefined command: \"{0}\".")]
    UnknownCommand(String),

    #[error("Don't know about thread {0}.")]
    UnknownThread(String),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Unwind request for the debugged program. Caught at the outermost
    /// dispatch boundary and turned into a detach.
    #[error("quit requested")]
    Quit,
}

pub type Result<T> = std::result::Result<T, DebugError>;
