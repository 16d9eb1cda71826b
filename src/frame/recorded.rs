use super::{evaluate, CodeInfo, ExceptionInfo, Frame, FrameId, FrameNote, Value, MAIN_THREAD};
use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

fn main_thread() -> String {
    MAIN_THREAD.to_string()
}

/// A frame snapshot with its variable bindings held as JSON values.
///
/// Used by the trace replayer and by tests; expressions are evaluated with
/// the crate's own evaluator, locals shadowing globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub id: FrameId,
    pub code: CodeInfo,
    pub line: u32,
    #[serde(default)]
    pub depth: usize,
    #[serde(default = "main_thread")]
    pub thread: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub locals: Map<String, Value>,
    #[serde(default)]
    pub globals: Map<String, Value>,
}

impl RecordedFrame {
    pub fn new(id: FrameId, code: CodeInfo, line: u32) -> Self {
        Self {
            id,
            code,
            line,
            depth: 0,
            thread: main_thread(),
            source: None,
            locals: Map::new(),
            globals: Map::new(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_thread(mut self, thread: &str) -> Self {
        self.thread = thread.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_local(mut self, name: &str, value: Value) -> Self {
        self.locals.insert(name.to_string(), value);
        self
    }

    pub fn set_local(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }
}

impl Frame for RecordedFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn code(&self) -> &CodeInfo {
        &self.code
    }

    fn line(&self) -> u32 {
        self.line
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn thread_name(&self) -> &str {
        &self.thread
    }

    fn source_line(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn eval(&self, expression: &str) -> Result<Value, EvalError> {
        let lookup = |name: &str| {
            self.locals
                .get(name)
                .or_else(|| self.globals.get(name))
                .cloned()
        };
        evaluate(expression, &lookup)
    }

    fn note(&mut self, note: FrameNote<'_>) {
        match note {
            FrameNote::Return(value) => {
                self.locals.insert("__return__".to_string(), value.clone());
            }
            FrameNote::Exception(ExceptionInfo { type_name, value }) => {
                self.locals.insert(
                    "__exception__".to_string(),
                    json!([type_name, value]),
                );
            }
        }
    }
}
