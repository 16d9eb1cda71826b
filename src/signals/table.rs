use super::names::{is_fatal, lookup_signum};
use crate::error::{DebugError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type HandlerFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Whatever was installed for a signal before the relay took it over.
#[derive(Clone)]
pub enum PreviousHandler {
    Default,
    Ignore,
    Handler(HandlerFn),
}

impl fmt::Debug for PreviousHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHandler::Default => write!(f, "Default"),
            PreviousHandler::Ignore => write!(f, "Ignore"),
            PreviousHandler::Handler(_) => write!(f, "Handler(<fn>)"),
        }
    }
}

impl PreviousHandler {
    pub fn invoke(&self, signum: i32) {
        if let PreviousHandler::Handler(handler) = self {
            handler(signum);
        }
    }
}

/// How one signal is handled.
///
/// `stop` implies `print` and not `pass`; `print == false` implies
/// `stop == false`.
#[derive(Debug, Clone)]
pub struct SignalEntry {
    pub signum: i32,
    pub stop: bool,
    pub print: bool,
    pub pass: bool,
    pub print_stack: bool,
    /// Handler to chain to when passing the signal on.
    pub previous: Option<PreviousHandler>,
    /// SIGKILL and SIGSTOP: listed, never changed.
    pub fatal: bool,
}

impl SignalEntry {
    pub fn new(signum: i32, stop: bool, print: bool, pass: bool) -> Self {
        Self {
            signum,
            stop,
            print,
            pass,
            print_stack: false,
            previous: None,
            fatal: false,
        }
    }

    pub fn is_consistent(&self) -> bool {
        (!self.stop || (self.print && !self.pass)) && (self.print || !self.stop)
    }

    fn set_stop(&mut self, on: bool) {
        self.stop = on;
        if on {
            self.print = true;
            self.pass = false;
        }
    }

    fn set_print(&mut self, on: bool) {
        self.print = on;
        if !on {
            self.stop = false;
        }
    }

    fn set_pass(&mut self, on: bool) {
        self.pass = on;
        if on {
            self.stop = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Stop(bool),
    Print(bool),
    Pass(bool),
    Stack(bool),
}

/// Parse one `handle` keyword: `[no]stop`, `[no]print`, `[no]pass`,
/// `[no]ignore`, `[no]stack`, each accepting a unique prefix.
fn parse_modifier(word: &str) -> Option<Modifier> {
    let lower = word.to_ascii_lowercase();
    let (on, attr) = match lower.strip_prefix("no") {
        Some(rest) => (false, rest.to_string()),
        None => (true, lower),
    };
    if attr.is_empty() {
        return None;
    }
    if "stop".starts_with(&attr) && attr.len() >= 2 {
        Some(Modifier::Stop(on))
    } else if "print".starts_with(&attr) && attr.len() >= 2 {
        Some(Modifier::Print(on))
    } else if "pass".starts_with(&attr) {
        Some(Modifier::Pass(on))
    } else if "ignore".starts_with(&attr) {
        Some(Modifier::Pass(!on))
    } else if "stack".starts_with(&attr) && attr.len() >= 3 {
        Some(Modifier::Stack(on))
    } else if attr == "s" {
        Some(Modifier::Stop(on))
    } else {
        None
    }
}

/// Per-signal handling, keyed by signal name.
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    entries: BTreeMap<String, SignalEntry>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, entry: SignalEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    /// Canonical table key for `name` (`USR1` → `SIGUSR1`).
    pub fn resolve(&self, name: &str) -> Option<String> {
        let upper = name.to_ascii_uppercase();
        if self.entries.contains_key(&upper) {
            return Some(upper);
        }
        let prefixed = format!("SIG{upper}");
        self.entries.contains_key(&prefixed).then_some(prefixed)
    }

    pub fn get(&self, name: &str) -> Option<&SignalEntry> {
        self.resolve(name).and_then(|key| self.entries.get(&key))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut SignalEntry> {
        let key = self.resolve(name)?;
        self.entries.get_mut(&key)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SignalEntry)> {
        self.entries
            .iter_mut()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn by_number(&self, signum: i32) -> Option<(&str, &SignalEntry)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.signum == signum)
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SignalEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply `handle`-style modifiers to one signal.
    ///
    /// The modifiers are folded into a copy of the entry which then replaces
    /// the stored one in a single assignment, so a handler running at any
    /// point sees either the old or the new settings, never a mix.
    pub fn action(&mut self, name: &str, modifiers: &[&str]) -> Result<&SignalEntry> {
        let key = self
            .resolve(name)
            .ok_or_else(|| DebugError::UnknownSignal(name.to_string()))?;
        if is_fatal(&key) && !modifiers.is_empty() {
            return Err(DebugError::FatalSignal(key));
        }

        let current = &self.entries[&key];
        let mut updated = current.clone();
        for word in modifiers {
            match parse_modifier(word) {
                Some(Modifier::Stop(on)) => updated.set_stop(on),
                Some(Modifier::Print(on)) => updated.set_print(on),
                Some(Modifier::Pass(on)) => updated.set_pass(on),
                Some(Modifier::Stack(on)) => updated.print_stack = on,
                None => {
                    return Err(DebugError::InvalidArgument(format!(
                        "unrecognized signal action \"{word}\""
                    )))
                }
            }
        }

        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| DebugError::UnknownSignal(name.to_string()))?;
        *entry = updated;
        Ok(entry)
    }

    /// Make `name` the signal that always stops the program.
    pub fn set_debug_signal(&mut self, name: &str) -> Result<String> {
        if lookup_signum(name).is_none() {
            return Err(DebugError::UnknownSignal(name.to_string()));
        }
        let key = self
            .resolve(name)
            .ok_or_else(|| DebugError::UnknownSignal(name.to_string()))?;
        self.action(&key, &["stop"])?;
        Ok(key)
    }

    pub fn info(&self, name: Option<&str>) -> Result<Vec<String>> {
        let mut lines = vec![
            format!("{:<14}{:<4}\t{:<4}\t{}", "Signal", "Stop", "Print", "Pass to program"),
            String::new(),
        ];
        let row = |name: &str, entry: &SignalEntry| {
            format!(
                "{:<14}{:<5}\t{:<5}\t{}",
                name, entry.stop, entry.print, entry.pass
            )
        };
        match name {
            Some(name) => {
                let key = self
                    .resolve(name)
                    .ok_or_else(|| DebugError::UnknownSignal(name.to_string()))?;
                lines.push(row(&key, &self.entries[&key]));
            }
            None => {
                for (name, entry) in &self.entries {
                    lines.push(row(name, entry));
                }
            }
        }
        Ok(lines)
    }
}
