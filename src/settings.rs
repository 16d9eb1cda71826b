use crate::error::Result;
use crate::signals::DEFAULT_IGNORED;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Debugger options, the `set`/`show` values that steer the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Print every executed line.
    pub linetrace: bool,
    /// Pause after each traced line, in milliseconds.
    pub linetrace_delay_ms: u64,
    /// Print function calls and returns.
    pub fntrace: bool,
    /// Stop on `def` header lines while stepping.
    pub deftrace: bool,
    /// Show only the basename of files in messages.
    pub basename: bool,
    /// Stop on exceptions even when not stepping.
    pub catch_exceptions: bool,
    pub maxstring: usize,
    pub maxother: usize,
    /// Stop at the first line of the main script.
    pub stop_on_entry: bool,
    /// Coordinate several debuggee threads through one controller.
    pub threads: bool,
    pub ignored_signals: Vec<String>,
    /// Signal that always stops the program, regardless of `handle`.
    pub debug_signal: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            linetrace: false,
            linetrace_delay_ms: 0,
            fntrace: false,
            deftrace: false,
            basename: false,
            catch_exceptions: false,
            maxstring: 100,
            maxother: 60,
            stop_on_entry: true,
            threads: false,
            ignored_signals: DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect(),
            debug_signal: None,
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn tracing(&self) -> bool {
        self.linetrace || self.fntrace
    }
}
