use crate::error::{DebugError, Result};
use crate::frame::{truthy, Frame};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub number: usize,
    /// Canonical absolute path.
    pub file: String,
    pub line: u32,
    pub temporary: bool,
    pub enabled: bool,
    pub condition: Option<String>,
    /// Number of upcoming qualifying hits to skip.
    pub ignore_count: u32,
    pub hits: u32,
    /// Only fire in the thread with this name.
    pub thread: Option<String>,
}

/// Breakpoints indexed by number and by (file, line).
///
/// Numbers start at 1, only grow, and are never handed out again after a
/// delete, so a stale number always fails the same way.
#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    by_number: Vec<Option<Breakpoint>>,
    by_location: HashMap<(String, u32), Vec<usize>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        file: &str,
        line: u32,
        temporary: bool,
        condition: Option<String>,
    ) -> Breakpoint {
        let number = self.by_number.len() + 1;
        let bp = Breakpoint {
            number,
            file: file.to_string(),
            line,
            temporary,
            enabled: true,
            condition,
            ignore_count: 0,
            hits: 0,
            thread: None,
        };
        self.by_location
            .entry((bp.file.clone(), line))
            .or_default()
            .push(number);
        debug!(number, file, line, temporary, "breakpoint added");
        self.by_number.push(Some(bp.clone()));
        bp
    }

    pub fn find(&self, number: usize) -> Option<&Breakpoint> {
        number
            .checked_sub(1)
            .and_then(|idx| self.by_number.get(idx))
            .and_then(Option::as_ref)
    }

    fn find_mut(&mut self, number: usize) -> Result<&mut Breakpoint> {
        number
            .checked_sub(1)
            .and_then(|idx| self.by_number.get_mut(idx))
            .and_then(Option::as_mut)
            .ok_or(DebugError::NoSuchBreakpoint(number))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.by_number.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    /// Breakpoints at a location, in creation order.
    pub fn at(&self, file: &str, line: u32) -> Vec<&Breakpoint> {
        self.by_location
            .get(&(file.to_string(), line))
            .map(|numbers| numbers.iter().filter_map(|n| self.find(*n)).collect())
            .unwrap_or_default()
    }

    pub fn has_breaks_in(&self, file: &str) -> bool {
        self.by_location.keys().any(|(f, _)| f == file)
    }

    /// Whether any breakpoint lies in `first..=last` of `file`. An unknown
    /// end line means the rest of the file.
    pub fn has_break_in_range(&self, file: &str, first: u32, last: Option<u32>) -> bool {
        self.by_location
            .keys()
            .any(|(f, line)| f == file && *line >= first && last.map_or(true, |l| *line <= l))
    }

    /// Find the breakpoint that fires at `file:line` for `frame`.
    ///
    /// Disabled breakpoints and ones bound to another thread are skipped.
    /// A condition that fails to evaluate counts as false. A satisfied hit
    /// with a positive ignore count only decrements the count. The flag is
    /// true when the returned breakpoint is temporary and should be deleted
    /// by the caller once it has stopped.
    pub fn effective(
        &mut self,
        file: &str,
        line: u32,
        frame: &dyn Frame,
    ) -> (Option<Breakpoint>, bool) {
        let numbers = match self.by_location.get(&(file.to_string(), line)) {
            Some(numbers) => numbers.clone(),
            None => return (None, false),
        };

        for number in numbers {
            let Ok(bp) = self.find_mut(number) else {
                continue;
            };
            if !bp.enabled {
                continue;
            }
            if let Some(thread) = &bp.thread {
                if thread != frame.thread_name() {
                    continue;
                }
            }
            if let Some(condition) = &bp.condition {
                match frame.eval(condition) {
                    Ok(value) if truthy(&value) => {}
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(number, condition = %condition, "condition failed: {err}");
                        continue;
                    }
                }
            }
            bp.hits += 1;
            if bp.ignore_count > 0 {
                bp.ignore_count -= 1;
                debug!(number, remaining = bp.ignore_count, "breakpoint hit ignored");
                continue;
            }
            let can_delete = bp.temporary;
            return (Some(bp.clone()), can_delete);
        }
        (None, false)
    }

    /// Remove every breakpoint at a location, returning their numbers.
    pub fn clear(&mut self, file: &str, line: u32) -> Result<Vec<usize>> {
        let numbers = self
            .by_location
            .remove(&(file.to_string(), line))
            .ok_or_else(|| DebugError::NoBreakpointAt {
                file: file.to_string(),
                line,
            })?;
        for number in &numbers {
            self.by_number[number - 1] = None;
        }
        debug!(?numbers, file, line, "breakpoints cleared");
        Ok(numbers)
    }

    pub fn delete(&mut self, number: usize) -> Result<Breakpoint> {
        let bp = number
            .checked_sub(1)
            .and_then(|idx| self.by_number.get_mut(idx))
            .and_then(Option::take)
            .ok_or(DebugError::NoSuchBreakpoint(number))?;
        let key = (bp.file.clone(), bp.line);
        if let Some(numbers) = self.by_location.get_mut(&key) {
            numbers.retain(|n| *n != number);
            if numbers.is_empty() {
                self.by_location.remove(&key);
            }
        }
        debug!(number, "breakpoint deleted");
        Ok(bp)
    }

    pub fn delete_all(&mut self) -> Vec<usize> {
        let numbers: Vec<usize> = self.iter().map(|bp| bp.number).collect();
        for slot in &mut self.by_number {
            *slot = None;
        }
        self.by_location.clear();
        numbers
    }

    pub fn enable(&mut self, number: usize, enabled: bool) -> Result<()> {
        self.find_mut(number)?.enabled = enabled;
        Ok(())
    }

    pub fn set_condition(&mut self, number: usize, condition: Option<String>) -> Result<()> {
        self.find_mut(number)?.condition = condition;
        Ok(())
    }

    pub fn set_ignore(&mut self, number: usize, count: u32) -> Result<()> {
        self.find_mut(number)?.ignore_count = count;
        Ok(())
    }

    pub fn set_thread(&mut self, number: usize, thread: Option<String>) -> Result<()> {
        self.find_mut(number)?.thread = thread;
        Ok(())
    }

    /// gdb-style `info breakpoints` listing.
    pub fn format_table(&self, basename: bool) -> Vec<String> {
        let mut lines = Vec::new();
        if self.is_empty() {
            lines.push("No breakpoints.".to_string());
            return lines;
        }
        lines.push("Num Type          Disp Enb    Where".to_string());
        for bp in self.iter() {
            let disp = if bp.temporary { "del  " } else { "keep " };
            let enb = if bp.enabled { "y  " } else { "n  " };
            lines.push(format!(
                "{:<4}breakpoint    {}{} at {}:{}",
                bp.number,
                disp,
                enb,
                display_file(&bp.file, basename),
                bp.line
            ));
            if let Some(condition) = &bp.condition {
                lines.push(format!("\tstop only if {condition}"));
            }
            if let Some(thread) = &bp.thread {
                lines.push(format!("\tstop only in thread {thread}"));
            }
            if bp.ignore_count > 0 {
                lines.push(format!("\tignore next {} hits", bp.ignore_count));
            }
            if bp.hits > 0 {
                let plural = if bp.hits > 1 { "s" } else { "" };
                lines.push(format!("\tbreakpoint already hit {} time{}", bp.hits, plural));
            }
        }
        lines
    }

    /// The table as debugger commands that recreate it in a fresh session.
    /// Numbers in `disable` lines refer to the renumbered breakpoints.
    pub fn save_commands(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (idx, bp) in self.iter().enumerate() {
            let verb = if bp.temporary { "tbreak" } else { "break" };
            let mut line = format!("{} {}:{}", verb, bp.file, bp.line);
            if let Some(thread) = &bp.thread {
                line.push_str(&format!(" thread {thread}"));
            }
            if let Some(condition) = &bp.condition {
                line.push_str(&format!(" if {condition}"));
            }
            out.push(line);
            if bp.ignore_count > 0 {
                out.push(format!("ignore {} {}", idx + 1, bp.ignore_count));
            }
            if !bp.enabled {
                out.push(format!("disable {}", idx + 1));
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let table: Vec<&Breakpoint> = self.iter().collect();
        Ok(serde_json::to_string_pretty(&table)?)
    }
}

pub(crate) fn display_file(file: &str, basename: bool) -> String {
    if basename {
        Path::new(file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string())
    } else {
        file.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CodeInfo, RecordedFrame};
    use serde_json::json;

    const FILE: &str = "/src/prog.py";

    fn frame_at(line: u32) -> RecordedFrame {
        RecordedFrame::new(1, CodeInfo::new("main", FILE, 1), line)
    }

    #[test]
    fn test_numbers_are_not_reused() {
        let mut registry = BreakpointRegistry::new();
        let first = registry.add(FILE, 3, false, None).number;
        registry.delete(first).unwrap();
        let second = registry.add(FILE, 3, false, None).number;
        assert_eq!(second, first + 1);
        assert!(matches!(
            registry.delete(first),
            Err(DebugError::NoSuchBreakpoint(n)) if n == first
        ));
        assert!(registry.find(second).is_some());
    }

    #[test]
    fn test_multiple_breakpoints_share_a_location() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 5, false, None);
        registry.add(FILE, 5, true, None);
        assert_eq!(registry.at(FILE, 5).len(), 2);
        assert_eq!(registry.clear(FILE, 5).unwrap(), vec![1, 2]);
        assert!(registry.at(FILE, 5).is_empty());
        assert!(registry.clear(FILE, 5).is_err());
    }

    #[test]
    fn test_effective_skips_disabled_and_false_conditions() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 7, false, None);
        registry.enable(1, false).unwrap();
        registry.add(FILE, 7, false, Some("x > 5".to_string()));
        registry.add(FILE, 7, false, None);

        let frame = frame_at(7).with_local("x", json!(1));
        let (bp, can_delete) = registry.effective(FILE, 7, &frame);
        assert_eq!(bp.map(|b| b.number), Some(3));
        assert!(!can_delete);
        assert_eq!(registry.find(2).unwrap().hits, 0);
    }

    #[test]
    fn test_condition_error_counts_as_false() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 7, false, Some("undefined_name > 5".to_string()));
        let (bp, _) = registry.effective(FILE, 7, &frame_at(7));
        assert!(bp.is_none());
    }

    #[test]
    fn test_ignore_count_suppresses_first_hits() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 2, true, None);
        registry.set_ignore(1, 2).unwrap();
        let frame = frame_at(2);
        assert_eq!(registry.effective(FILE, 2, &frame), (None, false));
        assert_eq!(registry.effective(FILE, 2, &frame), (None, false));
        let (bp, can_delete) = registry.effective(FILE, 2, &frame);
        assert_eq!(bp.unwrap().hits, 3);
        assert!(can_delete);
    }

    #[test]
    fn test_thread_affinity() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 4, false, None);
        registry.set_thread(1, Some("worker".to_string())).unwrap();
        let (bp, _) = registry.effective(FILE, 4, &frame_at(4));
        assert!(bp.is_none());
        let (bp, _) = registry.effective(FILE, 4, &frame_at(4).with_thread("worker"));
        assert!(bp.is_some());
    }

    #[test]
    fn test_range_lookup() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 10, false, None);
        assert!(registry.has_break_in_range(FILE, 8, Some(12)));
        assert!(!registry.has_break_in_range(FILE, 11, Some(20)));
        assert!(registry.has_break_in_range(FILE, 2, None));
        assert!(!registry.has_breaks_in("/src/other.py"));
    }

    #[test]
    fn test_table_and_saved_commands() {
        let mut registry = BreakpointRegistry::new();
        registry.add(FILE, 3, false, Some("n == 2".to_string()));
        registry.add(FILE, 9, true, None);
        registry.delete(1).unwrap();
        registry.add(FILE, 12, false, None);
        registry.enable(3, false).unwrap();

        let table = registry.format_table(true);
        assert_eq!(table[1], "2   breakpoint    del  y   at prog.py:9");
        assert_eq!(table[2], "3   breakpoint    keep n   at prog.py:12");

        assert_eq!(
            registry.save_commands(),
            vec![
                "tbreak /src/prog.py:9".to_string(),
                "break /src/prog.py:12".to_string(),
                "disable 2".to_string(),
            ]
        );
        assert!(registry.to_json().unwrap().contains("\"line\": 12"));
    }
}
