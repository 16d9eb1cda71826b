use super::names::lookup_signame;
use super::relay::SignalHost;
use super::table::PreviousHandler;
use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bit N set: signal N arrived and nobody has taken it yet.
static PENDING: AtomicU64 = AtomicU64::new(0);

/// Faults raised by the faulting instruction itself. A handler that only
/// records them would return into the same fault, so they keep their
/// disposition.
const SYNCHRONOUS: &[Signal] = &[Signal::SIGSEGV, Signal::SIGBUS, Signal::SIGFPE, Signal::SIGILL];

extern "C" fn record_signal(signum: c_int) {
    if (1..64).contains(&signum) {
        PENDING.fetch_or(1u64 << signum, Ordering::SeqCst);
    }
}

/// Host that installs a real `sigaction` handler in this process.
///
/// The handler only marks the signal as pending; the relay's dispatcher runs
/// later, on the next event, through [`SignalHost::take_pending`]. The
/// pending set is process-wide, so use one `ProcessHost` per process.
#[derive(Default)]
pub struct ProcessHost {
    saved: HashMap<i32, SigAction>,
}

impl ProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self, signum: i32) -> bool {
        self.saved.contains_key(&signum)
    }
}

impl SignalHost for ProcessHost {
    fn install(&mut self, signum: i32) -> Option<PreviousHandler> {
        if self.saved.contains_key(&signum) {
            return None;
        }
        let signal = match Signal::try_from(signum) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(signum, "cannot install handler: {e}");
                return None;
            }
        };
        if SYNCHRONOUS.contains(&signal) {
            debug!(?signal, "left at its own disposition");
            return None;
        }

        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: record_signal only touches an atomic.
        let old = match unsafe { sigaction(signal, &action) } {
            Ok(old) => old,
            Err(e) => {
                warn!(?signal, "sigaction failed: {e}");
                return None;
            }
        };
        let previous = previous_handler(signum, old.handler());
        self.saved.insert(signum, old);
        debug!(?signal, "dispatcher installed");
        Some(previous)
    }

    fn restore(&mut self, signum: i32, previous: Option<PreviousHandler>) {
        let Ok(signal) = Signal::try_from(signum) else {
            return;
        };
        let action = match self.saved.remove(&signum) {
            Some(saved) => saved,
            None => {
                let handler = match previous {
                    Some(PreviousHandler::Ignore) => SigHandler::SigIgn,
                    _ => SigHandler::SigDfl,
                };
                SigAction::new(handler, SaFlags::empty(), SigSet::empty())
            }
        };
        // SAFETY: the action is either the one sigaction handed back or a
        // default/ignore disposition.
        if let Err(e) = unsafe { sigaction(signal, &action) } {
            warn!(?signal, "restoring disposition failed: {e}");
        }
    }

    fn take_pending(&mut self) -> Vec<i32> {
        let bits = PENDING.swap(0, Ordering::SeqCst);
        (1..64).filter(|&signum| bits & (1u64 << signum) != 0).collect()
    }
}

fn previous_handler(signum: i32, handler: SigHandler) -> PreviousHandler {
    match handler {
        SigHandler::SigDfl => PreviousHandler::Default,
        SigHandler::SigIgn => PreviousHandler::Ignore,
        SigHandler::Handler(handler) => PreviousHandler::Handler(Arc::new(move |n| handler(n))),
        SigHandler::SigAction(_) => {
            warn!(
                signal = lookup_signame(signum).unwrap_or("?"),
                "previous handler wants siginfo and will not be chained"
            );
            PreviousHandler::Default
        }
    }
}
