use crate::debugger::{display_file, DebugSession, StopContext, Verdict};
use crate::error::{DebugError, Result};
use crate::frame::Frame;
use crate::parser::{is_comment, parse, Command, InfoTopic, Location};
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Reads and runs commands while the program is stopped, then says how to
/// resume it.
pub trait CommandLoop: Send {
    fn interaction(
        &mut self,
        session: &mut DebugSession,
        frame: &mut dyn Frame,
        stop: &StopContext,
    ) -> Result<Verdict>;
}

/// Run one command line. User errors are reported and yield `Ok(None)`;
/// only I/O failures propagate.
pub fn run_line(
    session: &mut DebugSession,
    frame: &mut dyn Frame,
    line: &str,
) -> Result<Option<Verdict>> {
    if is_comment(line) {
        return Ok(None);
    }
    debug!(line, "command");
    match parse(line).and_then(|command| execute(session, frame, command)) {
        Ok(verdict) => Ok(verdict),
        Err(DebugError::Io(err)) => Err(DebugError::Io(err)),
        Err(err) => {
            session.errmsg(&err.to_string());
            Ok(None)
        }
    }
}

/// Apply `command` to the session. Resumption commands return the verdict
/// that ends the interaction.
pub fn execute(
    session: &mut DebugSession,
    frame: &mut dyn Frame,
    command: Command,
) -> Result<Option<Verdict>> {
    match command {
        Command::Break {
            location,
            temporary,
            condition,
            thread,
        } => {
            let (file, line) = resolve(session, frame, location);
            let bp = session.breakpoints.add(&file, line, temporary, condition);
            if let Some(thread) = thread.filter(|name| name != "any") {
                session.breakpoints.set_thread(bp.number, Some(thread))?;
            }
            let kind = if temporary {
                "Temporary breakpoint"
            } else {
                "Breakpoint"
            };
            let shown = display_file(&file, session.settings.basename);
            session.msg(&format!("{} {} at {}:{}", kind, bp.number, shown, line));
        }
        Command::Clear(location) => {
            let (file, line) = resolve(session, frame, location);
            let numbers = session.breakpoints.clear(&file, line)?;
            let plural = if numbers.len() > 1 { "s" } else { "" };
            session.msg(&format!("Deleted breakpoint{} {}", plural, join(&numbers)));
        }
        Command::Delete(numbers) => {
            if numbers.is_empty() {
                session.breakpoints.delete_all();
            }
            for number in numbers {
                if let Err(err) = session.breakpoints.delete(number) {
                    session.errmsg(&err.to_string());
                }
            }
        }
        Command::Condition { number, condition } => {
            let unconditional = condition.is_none();
            session.breakpoints.set_condition(number, condition)?;
            if unconditional {
                session.msg(&format!("Breakpoint {number} now unconditional."));
            }
        }
        Command::Ignore { number, count } => {
            session.breakpoints.set_ignore(number, count)?;
            let text = match count {
                0 => format!("Will stop next time breakpoint {number} is reached."),
                1 => format!("Will ignore next crossing of breakpoint {number}."),
                n => format!("Will ignore next {n} crossings of breakpoint {number}."),
            };
            session.msg(&text);
        }
        Command::Enable(numbers) => set_enabled(session, numbers, true),
        Command::Disable(numbers) => set_enabled(session, numbers, false),
        Command::Step(count) => return Ok(Some(Verdict::Step(count))),
        Command::Next(count) => return Ok(Some(Verdict::Next(count))),
        Command::Continue => return Ok(Some(Verdict::Continue)),
        Command::Return => return Ok(Some(Verdict::Return)),
        Command::Quit => return Ok(Some(Verdict::Quit)),
        Command::Handle { signal, modifiers } => {
            let modifiers: Vec<&str> = modifiers.iter().map(String::as_str).collect();
            session.signals.action(&signal, &modifiers)?;
            for line in session.signals.info(Some(&signal))? {
                session.msg(&line);
            }
        }
        Command::Display { expression, format } => match expression {
            Some(expression) => {
                let line = session.displays.add(frame, &expression, format)?;
                session.msg(&line);
            }
            None => {
                for line in session.displays.evaluate_active(frame) {
                    session.msg(&line);
                }
            }
        },
        Command::Undisplay(numbers) => {
            if numbers.is_empty() {
                session.displays.clear();
            }
            for number in numbers {
                if let Err(err) = session.displays.delete(number) {
                    session.errmsg(&err.to_string());
                }
            }
        }
        Command::Info(topic) => {
            let lines = match topic {
                InfoTopic::Breakpoints => session.breakpoints.format_table(session.settings.basename),
                InfoTopic::Display => session.displays.list(),
                InfoTopic::Signals(name) => session.signals.info(name.as_deref())?,
                InfoTopic::Threads => session.threads.info(),
            };
            for line in lines {
                session.msg(&line);
            }
        }
        Command::Thread(names) => {
            if names.is_empty() {
                let current = session
                    .threads
                    .current()
                    .unwrap_or(frame.thread_name())
                    .to_string();
                session.msg(&format!("Current thread is {current}"));
                return Ok(None);
            }
            if !session.settings.threads {
                return Err(DebugError::InvalidArgument(
                    "thread switching needs multi-thread mode".to_string(),
                ));
            }
            session.threads.switch_to(&names)?;
            session.msg(&format!("Switching to thread {}", names.join(" ")));
            return Ok(Some(Verdict::Continue));
        }
        Command::Print(expression) => {
            let value = frame.eval(&expression)?;
            let shown = session.repr.repr(&value);
            session.msg(&shown);
        }
    }
    Ok(None)
}

fn resolve(session: &mut DebugSession, frame: &dyn Frame, location: Option<Location>) -> (String, u32) {
    match location {
        Some(Location {
            file: Some(file),
            line,
        }) => (session.canonic(&file), line),
        Some(Location { file: None, line }) => (session.canonic(&frame.code().filename), line),
        None => (session.canonic(&frame.code().filename), frame.line()),
    }
}

fn set_enabled(session: &mut DebugSession, numbers: Vec<usize>, enabled: bool) {
    let numbers = if numbers.is_empty() {
        session.breakpoints.iter().map(|bp| bp.number).collect()
    } else {
        numbers
    };
    for number in numbers {
        if let Err(err) = session.breakpoints.enable(number, enabled) {
            session.errmsg(&err.to_string());
        }
    }
}

fn join(numbers: &[usize]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every stop a [`ScriptedLoop`] has seen, shared with whoever built it.
pub type StopLog = Arc<Mutex<Vec<StopContext>>>;

/// Runs a fixed list of command lines; once they run out, every stop
/// simply continues.
#[derive(Debug, Default)]
pub struct ScriptedLoop {
    lines: VecDeque<String>,
    stops: StopLog,
}

impl ScriptedLoop {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            stops: StopLog::default(),
        }
    }

    pub fn stop_log(&self) -> StopLog {
        Arc::clone(&self.stops)
    }
}

impl CommandLoop for ScriptedLoop {
    fn interaction(
        &mut self,
        session: &mut DebugSession,
        frame: &mut dyn Frame,
        stop: &StopContext,
    ) -> Result<Verdict> {
        if let Ok(mut stops) = self.stops.lock() {
            stops.push(stop.clone());
        }
        loop {
            let line = match session.queued.pop_front().or_else(|| self.lines.pop_front()) {
                Some(line) => line,
                None => return Ok(Verdict::Continue),
            };
            if let Some(verdict) = run_line(session, frame, &line)? {
                return Ok(verdict);
            }
        }
    }
}

/// Interactive prompt on stderr, input from stdin.
pub struct StdinLoop {
    prompt: String,
    input: Box<dyn BufRead + Send>,
}

impl Default for StdinLoop {
    fn default() -> Self {
        Self::with_input(BufReader::new(io::stdin()))
    }
}

impl StdinLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt as usual but read commands from `input`.
    pub fn with_input(input: impl BufRead + Send + 'static) -> Self {
        Self {
            prompt: "(tracedbg) ".to_string(),
            input: Box::new(input),
        }
    }

    /// Reads retry reads interrupted by a signal; the dispatcher has already
    /// run by the time the read resumes.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        eprint!("{}", self.prompt);
        io::stderr().flush()?;
        let mut input = String::new();
        match self.input.read_line(&mut input)? {
            0 => Ok(None),
            _ => Ok(Some(input)),
        }
    }
}

impl CommandLoop for StdinLoop {
    fn interaction(
        &mut self,
        session: &mut DebugSession,
        frame: &mut dyn Frame,
        _stop: &StopContext,
    ) -> Result<Verdict> {
        loop {
            let line = match session.queued.pop_front() {
                Some(line) => {
                    session.msg(&format!("{}{}", self.prompt, line));
                    line
                }
                None => match self.read_line() {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        session.msg("quit");
                        return Ok(Verdict::Quit);
                    }
                    Err(err) => return Err(err.into()),
                },
            };

            // Empty input - step into by default
            if line.trim().is_empty() {
                return Ok(Verdict::Step(1));
            }
            if let Some(verdict) = run_line(session, frame, &line)? {
                return Ok(verdict);
            }
        }
    }
}
