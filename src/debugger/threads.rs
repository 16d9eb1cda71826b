use super::controller::ExecutionController;
use crate::error::{DebugError, Result};
use crate::frame::{ExecutionEvent, Frame, TraceDirective};
use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex};
use tracing::{debug, error};

/// Which debuggee threads exist, which of them may run debugger logic next,
/// and whether everybody has been told to quit.
#[derive(Debug, Default)]
pub struct ThreadBook {
    known: BTreeSet<String>,
    desired: Option<BTreeSet<String>>,
    switch_pending: bool,
    quit_requested: bool,
    current: Option<String>,
}

impl ThreadBook {
    pub fn register(&mut self, name: &str) {
        if !self.known.contains(name) {
            debug!(thread = name, "new thread");
            self.known.insert(name.to_string());
        }
    }

    /// A thread finished. A switch waiting only on finished threads is
    /// dropped so the others are not blocked forever.
    pub fn forget(&mut self, name: &str) {
        self.known.remove(name);
        if let Some(desired) = &mut self.desired {
            desired.remove(name);
            if desired.is_empty() {
                self.desired = None;
                self.switch_pending = false;
            }
        }
    }

    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn desired(&self) -> Option<&BTreeSet<String>> {
        self.desired.as_ref()
    }

    pub fn may_proceed(&self, name: &str) -> bool {
        self.desired
            .as_ref()
            .map_or(true, |desired| desired.contains(name))
    }

    /// Ask for the next stop to happen in one of `names`.
    pub fn switch_to(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Err(DebugError::InvalidArgument(
                "thread name required".to_string(),
            ));
        }
        if let Some(unknown) = names.iter().find(|name| !self.known.contains(*name)) {
            return Err(DebugError::UnknownThread(unknown.clone()));
        }
        self.desired = Some(names.iter().cloned().collect());
        self.switch_pending = true;
        debug!(?names, "thread switch requested");
        Ok(())
    }

    /// True once for the first desired thread to get through after a switch.
    pub(crate) fn take_switch(&mut self, name: &str) -> bool {
        if self.switch_pending && self.desired.is_some() && self.may_proceed(name) {
            self.switch_pending = false;
            return true;
        }
        false
    }

    /// `name` has stopped; a switch to it is complete.
    pub(crate) fn arrived(&mut self, name: &str) {
        self.current = Some(name.to_string());
        if self
            .desired
            .as_ref()
            .is_some_and(|desired| desired.contains(name))
        {
            self.desired = None;
        }
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn info(&self) -> Vec<String> {
        if self.known.is_empty() {
            return vec!["No threads.".to_string()];
        }
        self.known
            .iter()
            .map(|name| {
                let marker = if self.current.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                format!("{marker} {name}")
            })
            .collect()
    }
}

/// One controller shared by every debuggee thread.
///
/// The mutex lets one thread at a time run debugger logic, including the
/// whole interaction, so the other threads stay parked in their callback.
/// After a `thread` switch, threads other than the desired ones wait on the
/// condition variable until the switch is done or a quit is requested.
pub struct SharedController {
    inner: Mutex<ExecutionController>,
    turn: Condvar,
}

impl SharedController {
    pub fn new(controller: ExecutionController) -> Self {
        Self {
            inner: Mutex::new(controller),
            turn: Condvar::new(),
        }
    }

    pub fn dispatch(&self, frame: &mut dyn Frame, event: ExecutionEvent<'_>) -> TraceDirective {
        let name = frame.thread_name().to_string();
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to lock controller: {e}");
                return TraceDirective::Detach;
            }
        };
        guard.session_mut().threads.register(&name);

        loop {
            let threads = &guard.session().threads;
            if threads.quit_requested() {
                return TraceDirective::Detach;
            }
            if threads.may_proceed(&name) {
                break;
            }
            debug!(thread = %name, "waiting for turn");
            guard = match self.turn.wait(guard) {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Failed to wait for controller: {e}");
                    return TraceDirective::Detach;
                }
            };
        }

        if guard.session_mut().threads.take_switch(&name) {
            guard.session_mut().request_stop();
        }
        let directive = guard.dispatch(frame, event);
        drop(guard);
        self.turn.notify_all();
        directive
    }

    /// Tell the controller a debuggee thread has exited.
    pub fn thread_exited(&self, name: &str) {
        match self.inner.lock() {
            Ok(mut guard) => guard.session_mut().threads.forget(name),
            Err(e) => error!("Failed to lock controller: {e}"),
        }
        self.turn.notify_all();
    }

    /// Run `f` with the controller locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut ExecutionController) -> R) -> Option<R> {
        match self.inner.lock() {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(e) => {
                error!("Failed to lock controller: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(names: &[&str]) -> ThreadBook {
        let mut book = ThreadBook::default();
        for name in names {
            book.register(name);
        }
        book
    }

    #[test]
    fn test_switch_validates_names() {
        let mut book = book(&["MainThread", "worker"]);
        assert!(matches!(
            book.switch_to(&["ghost".to_string()]),
            Err(DebugError::UnknownThread(name)) if name == "ghost"
        ));
        assert!(book.desired().is_none());
        book.switch_to(&["worker".to_string()]).unwrap();
        assert!(!book.may_proceed("MainThread"));
        assert!(book.may_proceed("worker"));
    }

    #[test]
    fn test_switch_completes_on_arrival() {
        let mut book = book(&["MainThread", "worker"]);
        book.switch_to(&["worker".to_string()]).unwrap();
        assert!(!book.take_switch("MainThread"));
        assert!(book.take_switch("worker"));
        assert!(!book.take_switch("worker"));
        book.arrived("worker");
        assert!(book.may_proceed("MainThread"));
        assert_eq!(book.info(), vec!["  MainThread".to_string(), "* worker".to_string()]);
    }

    #[test]
    fn test_forgotten_target_releases_others() {
        let mut book = book(&["MainThread", "worker"]);
        book.switch_to(&["worker".to_string()]).unwrap();
        book.forget("worker");
        assert!(book.may_proceed("MainThread"));
    }
}
