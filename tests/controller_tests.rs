mod common;

use common::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracedbg::debugger::CapturedOutput;
use tracedbg::executor::{CommandLoop, ScriptedLoop, StopLog};
use tracedbg::frame::{CodeInfo, ExceptionInfo, ExecutionEvent, Frame, RecordedFrame, TraceDirective};
use tracedbg::{DebugSession, ExecutionController, Result, RunState, Settings, StopContext, StopReason, Verdict};

// Line numbers of a 20-line script whose loop runs line 10 three times.
fn loop_program() -> Vec<u32> {
    let mut lines: Vec<u32> = (1..=9).collect();
    for _ in 0..3 {
        lines.push(10);
        lines.push(11);
    }
    lines.extend(12..=20);
    lines
}

#[cfg(test)]
mod breakpoint_tests {
    use super::*;

    #[test]
    fn test_ignore_count_suppresses_first_hit() {
        let mut h = harness(quiet_settings(), &[]);
        h.session().breakpoints.add(PROG, 10, false, None);
        h.session().breakpoints.set_ignore(1, 1).unwrap();

        let mut frame = module_frame();
        h.call(&mut frame);
        h.lines(&mut frame, &loop_program());

        let stops = h.stops();
        assert_eq!(stops.len(), 2, "should stop on the 2nd and 3rd hits only");
        assert!(stops.iter().all(|stop| stop.reason == StopReason::Breakpoint(1)));
        assert_eq!(h.session().breakpoints.find(1).unwrap().hits, 3);
        assert_eq!(h.session().breakpoints.find(1).unwrap().ignore_count, 0);
    }

    #[test]
    fn test_temporary_breakpoint_with_false_condition_survives() {
        let mut h = harness(quiet_settings(), &[]);
        h.session()
            .breakpoints
            .add(PROG, 5, true, Some("x > 100".to_string()));

        let mut frame = module_frame().with_local("x", json!(1));
        h.lines(&mut frame, &(1..=20).collect::<Vec<u32>>());
        assert!(h.stops().is_empty());
        assert!(
            h.session().breakpoints.find(1).is_some(),
            "never fired, so it must still be there"
        );

        frame.set_local("x", json!(200));
        h.line(&mut frame, 5);
        assert_eq!(h.stops().len(), 1);
        assert!(h.session().breakpoints.find(1).is_none());

        h.line(&mut frame, 5);
        assert_eq!(h.stops().len(), 1, "a temporary breakpoint fires once");
    }

    #[test]
    fn test_undefined_condition_never_stops() {
        let mut h = harness(
            Settings::default(),
            &["break 10", "condition 1 x > 5", "continue"],
        );
        let mut frame = module_frame();
        h.call(&mut frame);
        h.lines(&mut frame, &loop_program());

        assert_eq!(h.stop_lines(), vec![1], "only the entry stop");
        assert!(h.output.contains("Breakpoint 1 at /work/prog.py:10"));
        assert!(!h.output.contains("No symbol"));
        assert_eq!(h.session().breakpoints.find(1).unwrap().hits, 0);
    }

    #[test]
    fn test_double_delete_reports_and_numbers_grow() {
        let mut h = harness(
            Settings::default(),
            &["break 4", "delete 1", "delete 1", "break 6", "info breakpoints", "continue"],
        );
        let mut frame = module_frame();
        h.line(&mut frame, 1);

        assert!(h.output.contains("*** No breakpoint number 1."));
        assert!(h.output.contains("Breakpoint 2 at /work/prog.py:6"));
        let numbers: Vec<usize> = h.session().breakpoints.iter().map(|bp| bp.number).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn test_function_breakpoint_fires_on_call() {
        let mut h = harness(quiet_settings(), &[]);
        let mut code = CodeInfo::new("helper", PROG, 30);
        code.last_line = Some(35);
        let mut helper = RecordedFrame::new(5, code, 30).with_depth(1);

        assert_eq!(h.call(&mut helper), TraceDirective::SkipLines);

        h.session().breakpoints.add(PROG, 30, false, None);
        assert_eq!(h.call(&mut helper), TraceDirective::Trace);
        assert_eq!(h.stops()[0].reason, StopReason::Breakpoint(1));
        assert_eq!(h.stops()[0].function, "helper");
    }

    #[test]
    fn test_breakpoint_in_body_keeps_frame_traced() {
        let mut h = harness(quiet_settings(), &[]);
        h.session().breakpoints.add(PROG, 33, false, None);
        let mut code = CodeInfo::new("helper", PROG, 30);
        code.last_line = Some(35);
        let mut helper = RecordedFrame::new(5, code, 30).with_depth(1);

        assert_eq!(h.call(&mut helper), TraceDirective::Trace);
        assert!(h.stops().is_empty());
        h.lines(&mut helper, &[31, 32, 33, 34]);
        assert_eq!(h.stop_lines(), vec![33]);
    }
}

#[cfg(test)]
mod stepping_tests {
    use super::*;

    #[test]
    fn test_step_into_and_return() {
        let mut h = harness(Settings::default(), &["step", "step", "step", "return", "next"]);
        let mut main = module_frame();
        let mut f = function_frame(2, "f", 5, 1);

        h.call(&mut main);
        h.lines(&mut main, &[1, 2]);
        assert_eq!(h.call(&mut f), TraceDirective::Trace);
        h.lines(&mut f, &[6, 7]);
        h.ret(&mut f, json!(42));
        h.line(&mut main, 3);

        let reasons: Vec<StopReason> = h.stops().iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                StopReason::Step,
                StopReason::Step,
                StopReason::Call,
                StopReason::Step,
                StopReason::Return,
                StopReason::Step,
            ]
        );
        assert_eq!(h.stop_lines(), vec![1, 2, 5, 6, 7, 3]);
        assert!(h.output.contains("--Call--"));
        assert!(h.output.contains("--Return--"));
        assert_eq!(f.locals.get("__return__"), Some(&json!(42)));
    }

    #[test]
    fn test_no_call_stop_while_tracing() {
        let settings = Settings {
            fntrace: true,
            ..Settings::default()
        };
        let mut h = harness(settings, &["step", "step"]);
        let mut main = module_frame();
        let mut f = function_frame(2, "f", 5, 1);

        h.line(&mut main, 1);
        assert_eq!(h.call(&mut f), TraceDirective::Trace);
        h.line(&mut f, 6);

        assert_eq!(h.stop_lines(), vec![1, 6]);
        assert!(h.output.contains("--Call level 1"));
        assert!(!h.output.contains("--Call--"));
    }

    #[test]
    fn test_next_steps_over_calls() {
        let mut h = harness(Settings::default(), &["next", "next"]);
        let mut main = module_frame();
        let mut f = function_frame(2, "f", 5, 1);

        h.lines(&mut main, &[1, 2]);
        assert_eq!(h.call(&mut f), TraceDirective::SkipLines);
        h.lines(&mut f, &[6, 7]);
        h.ret(&mut f, json!(null));
        h.line(&mut main, 3);

        assert_eq!(h.stop_lines(), vec![1, 2, 3]);
    }

    #[test]
    fn test_step_count_skips_events() {
        let mut h = harness(Settings::default(), &["step 3", "continue"]);
        let mut main = module_frame();
        h.lines(&mut main, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(h.stop_lines(), vec![1, 4]);
    }

    #[test]
    fn test_def_lines_are_skipped_unless_deftrace() {
        let program = [(1, "import os"), (2, "def helper():"), (5, "helper()")];
        for (deftrace, expected) in [(false, vec![1, 5]), (true, vec![1, 2, 5])] {
            let settings = Settings {
                deftrace,
                ..Settings::default()
            };
            let mut h = harness(settings, &["step", "step", "step"]);
            let mut main = module_frame();
            for (line, source) in program {
                main.source = Some(source.to_string());
                h.line(&mut main, line);
            }
            assert_eq!(h.stop_lines(), expected, "deftrace = {deftrace}");
        }
    }

    #[test]
    fn test_breakpoint_on_def_line_fires() {
        let mut h = harness(quiet_settings(), &["step", "step"]);
        h.session().breakpoints.add(PROG, 2, false, None);
        let mut main = module_frame();
        for (line, source) in [(1, "import os"), (2, "def helper():"), (4, "def other():"), (6, "helper()")] {
            main.source = Some(source.to_string());
            h.line(&mut main, line);
        }

        // the breakpoint fires on a def line, stepping still skips the next one
        assert_eq!(h.stop_lines(), vec![2, 6]);
        assert_eq!(h.stops()[0].reason, StopReason::Breakpoint(1));
        assert_eq!(h.stops()[1].reason, StopReason::Step);
    }

    #[test]
    fn test_request_stop() {
        let mut h = harness(quiet_settings(), &[]);
        let mut main = module_frame();
        h.line(&mut main, 1);
        h.session().request_stop();
        h.line(&mut main, 2);
        h.line(&mut main, 3);

        assert_eq!(h.stop_lines(), vec![2]);
        assert_eq!(h.stops()[0].reason, StopReason::Request);
        assert_eq!(h.session().stop_reason(), Some(&StopReason::Request));
    }

    #[test]
    fn test_interrupt_stops_immediately() {
        let mut h = harness(quiet_settings(), &["step"]);
        let mut main = module_frame().at_line(7);
        assert_eq!(h.controller.interrupt(&mut main), TraceDirective::Trace);
        h.line(&mut main, 8);
        assert_eq!(h.stop_lines(), vec![7, 8]);
    }

    #[test]
    fn test_waits_for_main_file() {
        let output = CapturedOutput::new();
        let session =
            DebugSession::new(Settings::default(), Box::new(output.clone())).with_main(PROG);
        let commands = ScriptedLoop::new(Vec::<String>::new());
        let stops = commands.stop_log();
        let mut controller = ExecutionController::new(session, Box::new(commands));

        let mut site = RecordedFrame::new(9, CodeInfo::new("<module>", "/usr/lib/site.py", 1), 1);
        controller.dispatch(&mut site, ExecutionEvent::Line);
        assert!(stops.lock().unwrap().is_empty());

        let mut main = module_frame();
        controller.dispatch(&mut main, ExecutionEvent::Line);
        let stops = stops.lock().unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].file, PROG);
    }
}

#[cfg(test)]
mod exception_tests {
    use super::*;

    fn zero_division() -> ExceptionInfo {
        ExceptionInfo {
            type_name: "ZeroDivisionError".to_string(),
            value: json!("division by zero"),
        }
    }

    #[test]
    fn test_caught_exception_stops_and_is_recorded() {
        let settings = Settings {
            catch_exceptions: true,
            ..quiet_settings()
        };
        let mut h = harness(settings, &[]);
        h.session().queue_commands(["info breakpoints"]);
        let mut f = function_frame(2, "f", 5, 1).at_line(6);
        let exception = zero_division();

        let directive = h.controller.dispatch(&mut f, ExecutionEvent::Exception(&exception));
        assert_eq!(directive, TraceDirective::Trace);

        let stops = h.stops();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].reason, StopReason::Exception);
        assert_eq!(stops[0].exception, Some(exception));
        assert!(h.output.contains("ZeroDivisionError:'division by zero'"));
        assert!(!h.output.contains("No breakpoints."), "read-ahead is discarded");
        assert!(f.locals.contains_key("__exception__"));
    }

    #[test]
    fn test_uncaught_exception_passes_while_running() {
        let mut h = harness(quiet_settings(), &[]);
        let mut f = function_frame(2, "f", 5, 1).at_line(6);
        h.controller
            .dispatch(&mut f, ExecutionEvent::Exception(&zero_division()));
        assert!(h.stops().is_empty());
        assert!(!f.locals.contains_key("__exception__"));
    }
}

#[cfg(test)]
mod tracing_tests {
    use super::*;

    #[test]
    fn test_linetrace_prints_without_stopping() {
        let settings = Settings {
            linetrace: true,
            ..quiet_settings()
        };
        let mut h = harness(settings, &[]);
        h.session().breakpoints.add(PROG, 2, false, None);
        let mut main = module_frame().with_source("x = 1");
        h.lines(&mut main, &[1, 2, 3]);

        assert_eq!(h.stop_lines(), vec![2]);
        assert!(h.output.contains("(/work/prog.py:1): <module>"));
        assert!(h.output.contains("(/work/prog.py:3): <module>"));
        assert!(h.output.contains("+ x = 1"));
    }

    #[test]
    fn test_fntrace_annotates_calls_and_returns() {
        let settings = Settings {
            fntrace: true,
            ..quiet_settings()
        };
        let mut h = harness(settings, &[]);
        let mut f = function_frame(2, "fact", 5, 1);
        h.call(&mut f);
        h.ret(&mut f, json!(120));
        h.ret(&mut f, json!([1, 2]));

        assert!(h.output.contains("--Call level 1"));
        assert!(h.output.contains("--Return from level 1 => 120 (int)"));
        assert!(h.output.contains("--Return from level 1 (list)"));
        assert!(h.stops().is_empty());
    }
}

/// Command loop that blows up, standing in for a bug in the debugger.
struct PanickingLoop;

impl CommandLoop for PanickingLoop {
    fn interaction(
        &mut self,
        _session: &mut DebugSession,
        _frame: &mut dyn Frame,
        _stop: &StopContext,
    ) -> Result<Verdict> {
        panic!("command table corrupted")
    }
}

/// Records what the session looked like from inside the interaction.
struct ObservingLoop {
    seen: Arc<Mutex<Vec<(RunState, usize)>>>,
}

impl CommandLoop for ObservingLoop {
    fn interaction(
        &mut self,
        session: &mut DebugSession,
        _frame: &mut dyn Frame,
        _stop: &StopContext,
    ) -> Result<Verdict> {
        self.seen
            .lock()
            .unwrap()
            .push((session.state(), session.interaction_depth()));
        Ok(Verdict::Continue)
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    fn test_quit_detaches() {
        let mut h = harness(Settings::default(), &["quit"]);
        let mut main = module_frame();
        assert_eq!(h.line(&mut main, 1), TraceDirective::Detach);
        assert_eq!(h.session().state(), RunState::Quitting);
        assert_eq!(h.line(&mut main, 2), TraceDirective::Detach);
        assert_eq!(h.stops().len(), 1);
    }

    #[test]
    fn test_fault_in_command_loop_is_contained() {
        let mut h = harness_with(Settings::default(), Box::new(PanickingLoop), StopLog::default());
        let mut main = module_frame();
        assert_eq!(h.line(&mut main, 1), TraceDirective::Trace);
        assert!(h.output.contains("internal error handling line event: command table corrupted"));
        assert_eq!(h.session().state(), RunState::Running);
        assert_eq!(h.session().interaction_depth(), 0);
    }

    #[test]
    fn test_states_during_interaction() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let commands = ObservingLoop { seen: seen.clone() };
        let mut h = harness_with(Settings::default(), Box::new(commands), StopLog::default());
        assert_eq!(h.session().state(), RunState::Running);
        let mut main = module_frame();
        h.line(&mut main, 1);
        assert_eq!(seen.lock().unwrap().as_slice(), &[(RunState::Interacting, 1)]);
        assert_eq!(h.session().state(), RunState::Running);
    }
}
