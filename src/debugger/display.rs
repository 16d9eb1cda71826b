use crate::error::{DebugError, EvalError, Result};
use crate::frame::{CodeInfo, Frame, Value};
use serde::Serialize;
use tracing::debug;

/// The call site a display belongs to: it is shown again whenever a frame
/// for the same function (name, file, first line) is current.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    pub function: String,
    pub filename: String,
    pub first_line: u32,
}

impl From<&CodeInfo> for CallSite {
    fn from(code: &CodeInfo) -> Self {
        Self {
            function: code.function.clone(),
            filename: code.filename.clone(),
            first_line: code.first_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayExpression {
    pub number: usize,
    pub expression: String,
    pub format: Option<String>,
    pub enabled: bool,
    pub site: CallSite,
}

impl DisplayExpression {
    fn render(&self, frame: &dyn Frame) -> std::result::Result<String, EvalError> {
        let value = frame.eval(&self.expression)?;
        let (what, shown) = match &self.format {
            Some(fmt) => (format!("{} {}", fmt, self.expression), printf(&value, fmt)),
            None => (self.expression.clone(), plain(&value)),
        };
        Ok(format!("{}: {} = {}", self.number, what, shown))
    }
}

#[derive(Debug)]
pub struct DisplayRegistry {
    entries: Vec<DisplayExpression>,
    next_number: usize,
}

impl Default for DisplayRegistry {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_number: 1,
        }
    }
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `expression` for the call site of `frame` and show it once.
    ///
    /// An expression that cannot be evaluated right away is dropped again
    /// and its number handed back.
    pub fn add(
        &mut self,
        frame: &dyn Frame,
        expression: &str,
        format: Option<String>,
    ) -> Result<String> {
        let entry = DisplayExpression {
            number: self.next_number,
            expression: expression.to_string(),
            format,
            enabled: true,
            site: CallSite::from(frame.code()),
        };
        self.next_number += 1;
        match entry.render(frame) {
            Ok(line) => {
                debug!(number = entry.number, expression, "display added");
                self.entries.push(entry);
                Ok(line)
            }
            Err(err) => {
                self.next_number -= 1;
                Err(err.into())
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayExpression> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate every enabled display registered for the frame's call site.
    ///
    /// A display that fails to evaluate is reported once and removed; when
    /// it was the most recently numbered one, its number is released too.
    pub fn evaluate_active(&mut self, frame: &dyn Frame) -> Vec<String> {
        let site = CallSite::from(frame.code());
        let mut lines = Vec::new();
        let mut dead = Vec::new();

        for entry in &self.entries {
            if !entry.enabled || entry.site != site {
                continue;
            }
            match entry.render(frame) {
                Ok(line) => lines.push(line),
                Err(err) => {
                    lines.push(err.to_string());
                    dead.push(entry.number);
                }
            }
        }

        for number in dead {
            debug!(number, "display removed after failing");
            self.remove(number);
        }
        lines
    }

    fn remove(&mut self, number: usize) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.number != number);
        let removed = self.entries.len() != before;
        // The counter only rolls back over the newest number; anything
        // older would hand out a number a live display still holds.
        if removed && number + 1 == self.next_number {
            self.next_number -= 1;
        }
        removed
    }

    pub fn delete(&mut self, number: usize) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.number != number);
        if self.entries.len() == before {
            return Err(DebugError::NoSuchDisplay(number));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn enable(&mut self, number: usize, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.number == number)
            .ok_or(DebugError::NoSuchDisplay(number))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec!["There are no auto-display expressions now.".to_string()];
        }
        let mut lines = vec![
            "Auto-display expressions now in effect:".to_string(),
            "Num Enb Expression".to_string(),
        ];
        for entry in &self.entries {
            let pad = " ".repeat(3usize.saturating_sub(entry.number.to_string().len()));
            let enb = if entry.enabled { " y  " } else { " n  " };
            let fmt = entry
                .format
                .as_ref()
                .map(|f| format!("{f} "))
                .unwrap_or_default();
            lines.push(format!(
                "{}:{}{}{}{}",
                entry.number, pad, enb, fmt, entry.expression
            ));
        }
        lines
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply a gdb print format (`/x`, `/o`, `/t`, `/c`, `/f`, `/s`).
pub fn printf(value: &Value, fmt: &str) -> String {
    let letter = fmt.trim_start_matches('/').chars().next();
    let int = value.as_i64();
    // radix formats show the sign in front of the magnitude
    let sign = |n: i64| if n < 0 { "-" } else { "" };
    match (letter, int) {
        (Some('x'), Some(n)) => format!("{}{:#x}", sign(n), n.unsigned_abs()),
        (Some('o'), Some(n)) => format!("{}{:#o}", sign(n), n.unsigned_abs()),
        (Some('t'), Some(n)) => {
            let bits = format!("{:b}", n.unsigned_abs());
            let width = bits.len().div_ceil(4) * 4;
            format!("{}{bits:0>width$}", sign(n))
        }
        (Some('c'), Some(n)) => u32::try_from(n)
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| plain(value)),
        (Some('f'), _) => value
            .as_f64()
            .map(|f| format!("{f:?}"))
            .unwrap_or_else(|| plain(value)),
        _ => plain(value),
    }
}
