use super::session::{DebugSession, StopContext};
use super::stepping::{RunState, StopReason};
use crate::error::{DebugError, Result};
use crate::executor::CommandLoop;
use crate::frame::{
    is_def_stmt, type_name, ExceptionInfo, ExecutionEvent, Frame, FrameNote, TraceDirective,
    Value,
};
use crate::signals::SignalRelay;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

/// The per-event callback the interpreter calls into.
///
/// Every event is classified, checked against the step state and the
/// breakpoint table, and, when the program should stop, handed to the
/// command loop. Nothing escapes [`ExecutionController::dispatch`]: a quit
/// turns into [`TraceDirective::Detach`], any other failure is reported and
/// the program keeps running.
pub struct ExecutionController {
    session: DebugSession,
    commands: Box<dyn CommandLoop>,
}

impl ExecutionController {
    pub fn new(session: DebugSession, commands: Box<dyn CommandLoop>) -> Self {
        Self { session, commands }
    }

    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DebugSession {
        &mut self.session
    }

    pub fn dispatch(&mut self, frame: &mut dyn Frame, event: ExecutionEvent<'_>) -> TraceDirective {
        let kind = event.kind();
        self.guarded(kind_name(&event), |ctl| {
            let file = ctl.session.canonic(&frame.code().filename);
            ctl.session.threads.register(frame.thread_name());
            if ctl.session.waiting_for_main(&file, kind) {
                return Ok(TraceDirective::Trace);
            }
            trace!(?kind, file = %file, line = frame.line(), "event");
            match event {
                ExecutionEvent::Call => ctl.on_call(frame, &file),
                ExecutionEvent::Line => ctl.on_line(frame, &file),
                ExecutionEvent::Return(value) => ctl.on_return(frame, &file, value),
                ExecutionEvent::Exception(exception) => ctl.on_exception(frame, &file, exception),
            }
        })
    }

    /// Stop right here, outside the per-line flow (`set_trace` style).
    pub fn interrupt(&mut self, frame: &mut dyn Frame) -> TraceDirective {
        self.guarded("interrupt", |ctl| {
            let file = ctl.session.canonic(&frame.code().filename);
            let stop = StopContext::new(StopReason::Request, frame, file);
            ctl.session.interact(ctl.commands.as_mut(), frame, stop)?;
            Ok(TraceDirective::Trace)
        })
    }

    /// Run the relay's dispatcher for `signum` with `frame` as the
    /// interrupted context.
    pub fn deliver_signal(
        &mut self,
        relay: &mut SignalRelay,
        signum: i32,
        frame: &mut dyn Frame,
    ) -> TraceDirective {
        self.guarded("signal", |ctl| {
            relay.dispatch(signum, &mut ctl.session, ctl.commands.as_mut(), frame)?;
            Ok(TraceDirective::Trace)
        })
    }

    /// Deliver every signal the relay's host caught since the last call,
    /// with `frame` as the interrupted context.
    pub fn poll_signals(&mut self, relay: &mut SignalRelay, frame: &mut dyn Frame) -> TraceDirective {
        for signum in relay.take_pending() {
            if self.deliver_signal(relay, signum, frame) == TraceDirective::Detach {
                return TraceDirective::Detach;
            }
        }
        TraceDirective::Trace
    }

    /// Outermost boundary: quits become a detach, errors and panics are
    /// reported and the program resumes without stopping.
    fn guarded<F>(&mut self, what: &str, body: F) -> TraceDirective
    where
        F: FnOnce(&mut Self) -> Result<TraceDirective>,
    {
        if self.session.state() == RunState::Quitting {
            return TraceDirective::Detach;
        }
        let depth = self.session.interaction_depth();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        match outcome {
            Ok(Ok(directive)) => directive,
            Ok(Err(DebugError::Quit)) => {
                self.session.mark_quitting();
                TraceDirective::Detach
            }
            Ok(Err(err)) => {
                error!(event = what, "debugger error: {err}");
                self.session.errmsg(&err.to_string());
                self.session.recover(depth);
                TraceDirective::Trace
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(event = what, "debugger fault: {message}");
                self.session
                    .errmsg(&format!("internal error handling {what} event: {message}"));
                self.session.recover(depth);
                TraceDirective::Trace
            }
        }
    }

    fn on_call(&mut self, frame: &mut dyn Frame, file: &str) -> Result<TraceDirective> {
        let session = &mut self.session;
        let code = frame.code().clone();
        // the outermost frame is never pruned: stops inside it may add
        // breakpoints for its later lines
        let interesting = frame.depth() == 0
            || session.settings.tracing()
            || session.settings.catch_exceptions
            || session.stepping.stop_requested
            || session.stepping.stop_here(frame)
            || session
                .breakpoints
                .has_break_in_range(file, code.first_line, code.last_line);
        if !interesting {
            return Ok(TraceDirective::SkipLines);
        }

        let tracing = session.settings.tracing();
        if tracing {
            session.msg(&format!("--Call level {}", frame.depth()));
            session.print_location(frame);
        }

        // The outermost frame gets a real line event for its first line.
        if frame.depth() == 0 {
            return Ok(TraceDirective::Trace);
        }
        let (bp, can_delete) = session.breakpoints.effective(file, code.first_line, frame);
        let reason = match bp {
            Some(bp) => {
                if can_delete {
                    session.breakpoints.delete(bp.number)?;
                }
                StopReason::Breakpoint(bp.number)
            }
            // stepping into a call stops on entry unless tracing already shows it
            None if !tracing && session.stepping.stop_here(frame) => StopReason::Call,
            None => return Ok(TraceDirective::Trace),
        };
        let stop = StopContext::new(reason, frame, file.to_string());
        self.session.interact(self.commands.as_mut(), frame, stop)?;
        Ok(TraceDirective::Trace)
    }

    fn on_line(&mut self, frame: &mut dyn Frame, file: &str) -> Result<TraceDirective> {
        let requested = self.session.stepping.stop_requested;
        let wants_step = requested || self.session.stepping.stop_here(frame);

        if wants_step && !requested && self.session.stepping.step_ignore > 0 {
            self.session.stepping.step_ignore -= 1;
            debug!(remaining = self.session.stepping.step_ignore, "step ignored");
            self.trace_line(frame);
            return Ok(TraceDirective::Trace);
        }

        let (bp, can_delete) = self.session.breakpoints.effective(file, frame.line(), frame);
        if let Some(bp) = bp {
            // only now that the stop is decided may a temporary one go
            if can_delete {
                self.session.breakpoints.delete(bp.number)?;
            }
            self.session.stepping.stop_requested = false;
            let stop = StopContext::new(StopReason::Breakpoint(bp.number), frame, file.to_string());
            self.session.interact(self.commands.as_mut(), frame, stop)?;
            return Ok(TraceDirective::Trace);
        }

        // def lines only skip stepping; a breakpoint there has already fired
        if !self.session.settings.deftrace && is_def_stmt(frame) {
            self.trace_line(frame);
            return Ok(TraceDirective::Trace);
        }

        if !wants_step || (!requested && self.session.stepping.step_ignore < 0) {
            self.trace_line(frame);
            return Ok(TraceDirective::Trace);
        }

        let reason = if requested {
            StopReason::Request
        } else {
            StopReason::Step
        };
        self.session.stepping.stop_requested = false;
        let stop = StopContext::new(reason, frame, file.to_string());
        self.session.interact(self.commands.as_mut(), frame, stop)?;
        Ok(TraceDirective::Trace)
    }

    fn on_return(&mut self, frame: &mut dyn Frame, file: &str, value: &Value) -> Result<TraceDirective> {
        frame.note(FrameNote::Return(value));
        if self.session.settings.tracing() {
            let shown = if value.is_array() || value.is_object() {
                format!(" ({})", type_name(value))
            } else {
                format!(" => {} ({})", self.session.repr.repr(value), type_name(value))
            };
            self.session
                .msg(&format!("--Return from level {}{}", frame.depth(), shown));
        }

        if self.session.stepping.returning_from(frame) {
            let stop = StopContext::new(StopReason::Return, frame, file.to_string());
            self.session.interact(self.commands.as_mut(), frame, stop)?;
        }
        Ok(TraceDirective::Trace)
    }

    fn on_exception(
        &mut self,
        frame: &mut dyn Frame,
        file: &str,
        exception: &ExceptionInfo,
    ) -> Result<TraceDirective> {
        if !(self.session.stepping.stop_here(frame) || self.session.settings.catch_exceptions) {
            return Ok(TraceDirective::Trace);
        }
        frame.note(FrameNote::Exception(exception));
        self.session.queued.clear();
        let summary = format!(
            "{}:{}",
            exception.type_name,
            self.session.repr.repr(&exception.value)
        );
        self.session.msg(&summary);
        let stop = StopContext::new(StopReason::Exception, frame, file.to_string())
            .with_exception(exception);
        self.session.interact(self.commands.as_mut(), frame, stop)?;
        Ok(TraceDirective::Trace)
    }

    fn trace_line(&mut self, frame: &dyn Frame) {
        if !self.session.settings.linetrace {
            return;
        }
        self.session.print_location(frame);
        for line in self.session.displays.evaluate_active(frame) {
            self.session.msg(&line);
        }
        let delay = self.session.settings.linetrace_delay_ms;
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
    }
}

fn kind_name(event: &ExecutionEvent<'_>) -> &'static str {
    match event {
        ExecutionEvent::Call => "call",
        ExecutionEvent::Line => "line",
        ExecutionEvent::Return(_) => "return",
        ExecutionEvent::Exception(_) => "exception",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
