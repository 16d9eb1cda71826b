use super::names::{is_fatal, lookup_signum, SIGNALS};
use super::table::{PreviousHandler, SignalEntry, SignalTable};
use crate::debugger::{DebugSession, StopContext, StopReason};
use crate::error::{DebugError, Result};
use crate::executor::CommandLoop;
use crate::frame::Frame;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The OS seam: installing the relay's dispatcher for a signal and putting
/// the old disposition back.
pub trait SignalHost: Send {
    /// Install the dispatcher for `signum`. Returns the disposition it
    /// replaced, or `None` when the dispatcher was already installed.
    fn install(&mut self, signum: i32) -> Option<PreviousHandler>;

    fn restore(&mut self, signum: i32, previous: Option<PreviousHandler>);

    /// Signals that arrived since the last call, oldest number first.
    fn take_pending(&mut self) -> Vec<i32> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct HostState {
    dispositions: HashMap<i32, PreviousHandler>,
    installed: BTreeSet<i32>,
    pending: Vec<i32>,
}

/// In-memory host that records installs instead of touching process state.
/// Clones share the same state, so a test can keep one and hand the other
/// to the relay.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    state: Arc<Mutex<HostState>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the program had already installed `handler` for `signum`.
    pub fn with_handler(self, signum: i32, handler: PreviousHandler) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.dispositions.insert(signum, handler);
        }
        self
    }

    pub fn is_installed(&self, signum: i32) -> bool {
        match self.state.lock() {
            Ok(state) => state.installed.contains(&signum),
            Err(_) => false,
        }
    }

    /// Deliver `signum` as the process would: queued for the relay when its
    /// dispatcher is installed, dropped otherwise.
    pub fn raise(&self, signum: i32) {
        if let Ok(mut state) = self.state.lock() {
            if state.installed.contains(&signum) {
                state.pending.push(signum);
            }
        }
    }

    /// What the process would run for `signum` when the relay is not installed.
    pub fn disposition(&self, signum: i32) -> Option<PreviousHandler> {
        match self.state.lock() {
            Ok(state) => state.dispositions.get(&signum).cloned(),
            Err(_) => None,
        }
    }
}

impl SignalHost for RecordingHost {
    fn install(&mut self, signum: i32) -> Option<PreviousHandler> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!("signal host state poisoned: {e}");
                return None;
            }
        };
        if !state.installed.insert(signum) {
            return None;
        }
        Some(
            state
                .dispositions
                .get(&signum)
                .cloned()
                .unwrap_or(PreviousHandler::Default),
        )
    }

    fn restore(&mut self, signum: i32, previous: Option<PreviousHandler>) {
        if let Ok(mut state) = self.state.lock() {
            state.installed.remove(&signum);
            match previous {
                Some(previous) => {
                    state.dispositions.insert(signum, previous);
                }
                None => {
                    state.dispositions.remove(&signum);
                }
            }
        }
    }

    fn take_pending(&mut self) -> Vec<i32> {
        match self.state.lock() {
            Ok(mut state) => std::mem::take(&mut state.pending),
            Err(_) => Vec::new(),
        }
    }
}

/// Routes process signals into the debugger.
pub struct SignalRelay {
    host: Box<dyn SignalHost>,
}

impl SignalRelay {
    pub fn new(host: Box<dyn SignalHost>) -> Self {
        Self { host }
    }

    /// Create an entry for every known signal and take over the ones not in
    /// `ignore`. Calling it again keeps the handlers saved the first time.
    pub fn register_known_signals(&mut self, table: &mut SignalTable, ignore: &[String]) {
        for (name, signum) in SIGNALS {
            if is_fatal(name) {
                let mut placeholder = SignalEntry::new(*signum, false, false, true);
                placeholder.fatal = true;
                table.insert(name, placeholder);
                continue;
            }
            if ignore.iter().any(|ignored| ignored.eq_ignore_ascii_case(name)) {
                if table.get(name).is_none() {
                    table.insert(name, SignalEntry::new(*signum, false, false, true));
                }
                continue;
            }

            let installed = self.host.install(*signum);
            match table.get_mut(name) {
                Some(entry) => {
                    if entry.previous.is_none() {
                        entry.previous = installed;
                    }
                }
                None => {
                    let mut entry = SignalEntry::new(*signum, true, true, false);
                    entry.previous = installed;
                    table.insert(name, entry);
                }
            }
        }
        debug!(entries = table.len(), "signals registered");
    }

    /// Register every signal for `session`, honoring its ignore list and
    /// debug signal.
    pub fn attach(&mut self, session: &mut DebugSession) -> Result<()> {
        let ignore = session.settings.ignored_signals.clone();
        self.register_known_signals(&mut session.signals, &ignore);
        if let Some(name) = session.settings.debug_signal.clone() {
            self.set_debug_signal(&mut session.signals, &name)?;
        }
        Ok(())
    }

    /// Hand every signal back to the disposition saved at registration.
    pub fn unregister(&mut self, table: &mut SignalTable) {
        for (name, entry) in table.iter_mut() {
            if entry.fatal {
                continue;
            }
            if let Some(previous) = entry.previous.take() {
                debug!(signal = name, "restoring previous handler");
                self.host.restore(entry.signum, Some(previous));
            }
        }
    }

    /// Signals the host caught since the last call.
    pub fn take_pending(&mut self) -> Vec<i32> {
        self.host.take_pending()
    }

    /// Make `name` stop the program, installing the dispatcher if the signal
    /// was on the ignore list.
    pub fn set_debug_signal(&mut self, table: &mut SignalTable, name: &str) -> Result<String> {
        let signum =
            lookup_signum(name).ok_or_else(|| DebugError::UnknownSignal(name.to_string()))?;
        let installed = self.host.install(signum);
        if let Some(entry) = table.get_mut(name) {
            if entry.previous.is_none() {
                entry.previous = installed;
            }
        }
        table.set_debug_signal(name)
    }

    /// The dispatcher body for one delivered signal.
    ///
    /// The notice is printed first, then the program stops in `frame` if
    /// requested, and finally the saved handler runs when the signal is
    /// passed on, whatever the interaction returned.
    pub fn dispatch(
        &mut self,
        signum: i32,
        session: &mut DebugSession,
        commands: &mut dyn CommandLoop,
        frame: &mut dyn Frame,
    ) -> Result<()> {
        let (name, entry) = match session.signals.by_number(signum) {
            Some((name, entry)) => (name.to_string(), entry.clone()),
            None => {
                warn!(signum, "signal without a table entry");
                return Ok(());
            }
        };

        if entry.print {
            session.msg(&format!("Program received signal {name}"));
            if entry.print_stack {
                let location = session.location(frame);
                session.msg(&location);
            }
        }

        let outcome = if entry.stop {
            // whatever was read ahead belongs to the interrupted prompt
            session.queued.clear();
            let file = session.canonic(&frame.code().filename);
            let stop = StopContext::new(StopReason::Signal(name.clone()), frame, file);
            session.interact(commands, frame, stop)
        } else {
            Ok(())
        };

        if entry.pass {
            if let Some(previous) = &entry.previous {
                debug!(signal = %name, ?previous, "passing signal on");
                previous.invoke(signum);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::DEFAULT_IGNORED;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ignored() -> Vec<String> {
        DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registration_covers_every_signal() {
        let mut relay = SignalRelay::new(Box::new(RecordingHost::new()));
        let mut table = SignalTable::new();
        relay.register_known_signals(&mut table, &ignored());

        assert_eq!(table.len(), SIGNALS.len());
        let kill = table.get("SIGKILL").unwrap();
        assert!(kill.fatal && !kill.stop && kill.pass);
        let int = table.get("SIGINT").unwrap();
        assert!(!int.stop && !int.print && int.pass && int.previous.is_none());
        let usr1 = table.get("SIGUSR1").unwrap();
        assert!(usr1.stop && usr1.print && !usr1.pass);
        assert!(matches!(usr1.previous, Some(PreviousHandler::Default)));
        for (name, entry) in table.iter() {
            assert!(entry.is_consistent(), "{name}");
        }
    }

    #[test]
    fn test_reregistration_keeps_saved_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handler = PreviousHandler::Handler(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let host = RecordingHost::new().with_handler(10, handler);
        let mut relay = SignalRelay::new(Box::new(host));
        let mut table = SignalTable::new();

        relay.register_known_signals(&mut table, &ignored());
        relay.register_known_signals(&mut table, &ignored());

        let previous = table.get("SIGUSR1").unwrap().previous.clone().unwrap();
        previous.invoke(10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_signal_installs_ignored_signal() {
        let mut relay = SignalRelay::new(Box::new(RecordingHost::new()));
        let mut table = SignalTable::new();
        relay.register_known_signals(&mut table, &ignored());
        assert_eq!(relay.set_debug_signal(&mut table, "int").unwrap(), "SIGINT");
        let entry = table.get("SIGINT").unwrap();
        assert!(entry.stop && entry.print && !entry.pass);
        assert!(entry.previous.is_some());
        assert!(relay.set_debug_signal(&mut table, "SIGBOGUS").is_err());
    }

    #[test]
    fn test_unregister_restores_dispositions() {
        let host = RecordingHost::new().with_handler(12, PreviousHandler::Ignore);
        let mut relay = SignalRelay::new(Box::new(host.clone()));
        let mut table = SignalTable::new();
        relay.register_known_signals(&mut table, &ignored());
        assert!(host.is_installed(12));
        assert!(!host.is_installed(2));

        relay.unregister(&mut table);
        assert!(!host.is_installed(12));
        assert!(matches!(host.disposition(12), Some(PreviousHandler::Ignore)));
        assert!(table.get("SIGUSR2").unwrap().previous.is_none());
    }

    #[test]
    fn test_only_installed_signals_become_pending() {
        let host = RecordingHost::new();
        let mut relay = SignalRelay::new(Box::new(host.clone()));
        let mut table = SignalTable::new();
        relay.register_known_signals(&mut table, &ignored());

        host.raise(2);
        host.raise(12);
        host.raise(10);
        assert_eq!(relay.take_pending(), vec![12, 10], "SIGINT is ignored, so never caught");
        assert!(relay.take_pending().is_empty());
    }
}
