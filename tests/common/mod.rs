#![allow(dead_code)]

use serde_json::Value;
use tracedbg::debugger::CapturedOutput;
use tracedbg::executor::{CommandLoop, ScriptedLoop, StopLog};
use tracedbg::frame::{CodeInfo, ExecutionEvent, RecordedFrame, TraceDirective};
use tracedbg::{DebugSession, ExecutionController, Settings, StopContext};

pub const PROG: &str = "/work/prog.py";

pub struct Harness {
    pub controller: ExecutionController,
    pub output: CapturedOutput,
    pub stops: StopLog,
}

impl Harness {
    pub fn stops(&self) -> Vec<StopContext> {
        self.stops.lock().unwrap().clone()
    }

    pub fn stop_lines(&self) -> Vec<u32> {
        self.stops().iter().map(|stop| stop.line).collect()
    }

    pub fn session(&mut self) -> &mut DebugSession {
        self.controller.session_mut()
    }

    pub fn call(&mut self, frame: &mut RecordedFrame) -> TraceDirective {
        self.controller.dispatch(frame, ExecutionEvent::Call)
    }

    pub fn line(&mut self, frame: &mut RecordedFrame, line: u32) -> TraceDirective {
        frame.line = line;
        self.controller.dispatch(frame, ExecutionEvent::Line)
    }

    pub fn lines(&mut self, frame: &mut RecordedFrame, lines: &[u32]) -> Vec<TraceDirective> {
        lines.iter().map(|line| self.line(frame, *line)).collect()
    }

    pub fn ret(&mut self, frame: &mut RecordedFrame, value: Value) -> TraceDirective {
        self.controller.dispatch(frame, ExecutionEvent::Return(&value))
    }
}

/// Settings for tests that drive the controller by hand: no entry stop.
pub fn quiet_settings() -> Settings {
    Settings {
        stop_on_entry: false,
        ..Settings::default()
    }
}

pub fn harness(settings: Settings, script: &[&str]) -> Harness {
    let commands = ScriptedLoop::new(script.iter().copied());
    let stops = commands.stop_log();
    harness_with(settings, Box::new(commands), stops)
}

pub fn harness_with(settings: Settings, commands: Box<dyn CommandLoop>, stops: StopLog) -> Harness {
    let output = CapturedOutput::new();
    let session = DebugSession::new(settings, Box::new(output.clone()));
    Harness {
        controller: ExecutionController::new(session, commands),
        output,
        stops,
    }
}

pub fn module_frame() -> RecordedFrame {
    RecordedFrame::new(1, CodeInfo::new("<module>", PROG, 1), 1)
}

pub fn function_frame(id: u64, name: &str, first_line: u32, depth: usize) -> RecordedFrame {
    RecordedFrame::new(id, CodeInfo::new(name, PROG, first_line), first_line).with_depth(depth)
}
