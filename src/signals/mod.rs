//! Signal handling: which signals stop, print or reach the program, and the
//! relay that turns a delivered signal into a debugger stop.

mod names;
mod process;
mod relay;
mod table;

pub use names::{is_fatal, lookup_signame, lookup_signum, DEFAULT_IGNORED, FATAL_SIGNALS, SIGNALS};
pub use process::ProcessHost;
pub use relay::{RecordingHost, SignalHost, SignalRelay};
pub use table::{HandlerFn, PreviousHandler, SignalEntry, SignalTable};
