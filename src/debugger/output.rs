use std::sync::{Arc, Mutex};

/// Where user-facing debugger messages go.
pub trait Output: Send {
    fn msg(&mut self, text: &str);

    fn errmsg(&mut self, text: &str) {
        self.msg(&format!("*** {text}"));
    }
}

/// Messages on stderr, leaving stdout to the debugged program.
#[derive(Debug, Default)]
pub struct StderrOutput;

impl Output for StderrOutput {
    fn msg(&mut self, text: &str) {
        eprintln!("{}", text);
    }
}

/// Collects messages in memory; clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Output for CapturedOutput {
    fn msg(&mut self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}
