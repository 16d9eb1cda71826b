use super::breakpoints::{display_file, BreakpointRegistry};
use super::display::DisplayRegistry;
use super::output::Output;
use super::stepping::{RunState, StepControl, StopReason, Verdict};
use super::threads::ThreadBook;
use crate::error::{DebugError, Result};
use crate::executor::CommandLoop;
use crate::frame::{EventKind, ExceptionInfo, Frame, SafeRepr};
use crate::settings::Settings;
use crate::signals::SignalTable;
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Snapshot of one stop, handed to the command loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StopContext {
    pub reason: StopReason,
    pub file: String,
    pub line: u32,
    pub function: String,
    pub thread: String,
    pub depth: usize,
    pub exception: Option<ExceptionInfo>,
}

impl StopContext {
    pub fn new(reason: StopReason, frame: &dyn Frame, file: String) -> Self {
        Self {
            reason,
            file,
            line: frame.line(),
            function: frame.code().function.clone(),
            thread: frame.thread_name().to_string(),
            depth: frame.depth(),
            exception: None,
        }
    }

    pub fn with_exception(mut self, exception: &ExceptionInfo) -> Self {
        self.exception = Some(exception.clone());
        self
    }
}

/// All debugger state for one debugged program.
///
/// The controller and the command loop both work on this struct; nothing
/// lives in globals. In multi-thread mode it sits behind the controller's
/// single lock, so only one thread ever touches it at a time.
pub struct DebugSession {
    pub settings: Settings,
    pub breakpoints: BreakpointRegistry,
    pub displays: DisplayRegistry,
    pub signals: SignalTable,
    pub stepping: StepControl,
    pub threads: ThreadBook,
    /// Command lines to run before reading new input.
    pub queued: VecDeque<String>,
    pub repr: SafeRepr,
    state: RunState,
    stop_reason: Option<StopReason>,
    interactions: Vec<StopContext>,
    output: Box<dyn Output>,
    canonic_cache: HashMap<String, String>,
    main_dir: PathBuf,
    main_file: Option<String>,
    waiting_for_main: bool,
}

impl DebugSession {
    pub fn new(settings: Settings, output: Box<dyn Output>) -> Self {
        let stepping = StepControl::new(settings.stop_on_entry);
        let repr = SafeRepr::new(settings.maxstring, settings.maxother);
        Self {
            settings,
            breakpoints: BreakpointRegistry::new(),
            displays: DisplayRegistry::new(),
            signals: SignalTable::new(),
            stepping,
            threads: ThreadBook::default(),
            queued: VecDeque::new(),
            repr,
            state: RunState::Running,
            stop_reason: None,
            interactions: Vec::new(),
            output,
            canonic_cache: HashMap::new(),
            main_dir: std::env::current_dir().unwrap_or_default(),
            main_file: None,
            waiting_for_main: false,
        }
    }

    /// Ignore events until the first line of `path` runs; relative file
    /// names are resolved against its directory from then on.
    pub fn with_main(mut self, path: &str) -> Self {
        let main = self.canonic(path);
        if let Some(dir) = Path::new(&main).parent() {
            self.main_dir = dir.to_path_buf();
        }
        self.main_file = Some(main);
        self.waiting_for_main = true;
        self
    }

    pub fn main_file(&self) -> Option<&str> {
        self.main_file.as_deref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Reason of the most recent stop.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// The innermost stop currently being interacted with.
    pub fn current_stop(&self) -> Option<&StopContext> {
        self.interactions.last()
    }

    pub fn interaction_depth(&self) -> usize {
        self.interactions.len()
    }

    pub fn msg(&mut self, text: &str) {
        self.output.msg(text);
    }

    pub fn errmsg(&mut self, text: &str) {
        self.output.errmsg(text);
    }

    /// Stop at the next line event, whatever the run mode says.
    pub fn request_stop(&mut self) {
        self.stepping.stop_requested = true;
    }

    pub fn queue_commands<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queued.extend(lines.into_iter().map(Into::into));
    }

    /// Absolute, normalized form of `filename`. Pseudo files such as
    /// `<string>` are returned unchanged.
    pub fn canonic(&mut self, filename: &str) -> String {
        if filename.starts_with('<') && filename.ends_with('>') {
            return filename.to_string();
        }
        if let Some(known) = self.canonic_cache.get(filename) {
            return known.clone();
        }
        let path = Path::new(filename);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.main_dir.join(path)
        };
        let canonical = normalize(&joined);
        self.canonic_cache
            .insert(filename.to_string(), canonical.clone());
        canonical
    }

    /// Whether events are still being ignored until the main file starts.
    pub(crate) fn waiting_for_main(&mut self, file: &str, kind: EventKind) -> bool {
        if !self.waiting_for_main {
            return false;
        }
        match &self.main_file {
            Some(main) if kind == EventKind::Line && main == file => {
                debug!(file, "main file reached");
                self.waiting_for_main = false;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// `(file:line): function`
    pub fn location(&mut self, frame: &dyn Frame) -> String {
        let file = self.canonic(&frame.code().filename);
        format!(
            "({}:{}): {}",
            display_file(&file, self.settings.basename),
            frame.line(),
            frame.code().function
        )
    }

    pub fn print_location(&mut self, frame: &dyn Frame) {
        let location = self.location(frame);
        self.msg(&location);
        if let Some(source) = frame.source_line() {
            self.msg(&format!("+ {}", source.trim_end()));
        }
    }

    /// Hand control to `commands` for one stop and act on its verdict.
    ///
    /// Interactions nest: a signal can stop the program while another stop
    /// is being interacted with. A nested interaction restores the outer
    /// one's state when it ends and leaves stepping alone; only `quit`
    /// reaches past it.
    pub fn interact(
        &mut self,
        commands: &mut dyn CommandLoop,
        frame: &mut dyn Frame,
        stop: StopContext,
    ) -> Result<()> {
        let outer_state = self.state;
        let nested = outer_state == RunState::Interacting;
        let outer_reason = self.stop_reason.replace(stop.reason.clone());
        self.state = RunState::Interacting;
        self.threads.arrived(&stop.thread);
        debug!(reason = %stop.reason, file = %stop.file, line = stop.line, nested, "stopped");

        self.announce(frame, &stop);
        self.interactions.push(stop.clone());
        let verdict = commands.interaction(self, frame, &stop);
        self.interactions.pop();

        match verdict {
            Ok(Verdict::Quit) | Err(DebugError::Quit) => {
                self.mark_quitting();
                Err(DebugError::Quit)
            }
            Err(err) => {
                self.state = outer_state;
                if nested {
                    self.stop_reason = outer_reason;
                }
                Err(err)
            }
            Ok(verdict) => {
                if nested {
                    self.state = outer_state;
                    self.stop_reason = outer_reason;
                    debug!(?verdict, "nested interaction finished");
                } else {
                    self.state = RunState::Running;
                    let linetrace = self.settings.linetrace;
                    self.stepping.apply(verdict, frame, linetrace);
                    debug!(?verdict, mode = ?self.stepping.mode, "resuming");
                }
                Ok(())
            }
        }
    }

    fn announce(&mut self, frame: &dyn Frame, stop: &StopContext) {
        match &stop.reason {
            StopReason::Breakpoint(number) => {
                let file = display_file(&stop.file, self.settings.basename);
                self.msg(&format!(
                    "Breakpoint {}, {} at {}:{}",
                    number, stop.function, file, stop.line
                ));
            }
            StopReason::Call => self.msg("--Call--"),
            StopReason::Return => self.msg("--Return--"),
            _ => {}
        }
        self.print_location(frame);
        for line in self.displays.evaluate_active(frame) {
            self.msg(&line);
        }
    }

    pub(crate) fn mark_quitting(&mut self) {
        if self.state != RunState::Quitting {
            debug!("quitting");
        }
        self.state = RunState::Quitting;
        self.threads.request_quit();
    }

    /// Drop interactions left open by a fault unwinding through them.
    pub(crate) fn recover(&mut self, depth: usize) {
        self.interactions.truncate(depth);
        if self.state != RunState::Quitting {
            self.state = if self.interactions.is_empty() {
                RunState::Running
            } else {
                RunState::Interacting
            };
        }
    }
}

fn normalize(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}
