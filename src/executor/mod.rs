mod command_loop;
mod replay;

pub use command_loop::{execute, run_line, CommandLoop, ScriptedLoop, StdinLoop, StopLog};
pub use replay::{read_trace, replay_records, ReplaySummary, TraceRecord};
