use crate::debugger::ExecutionController;
use crate::error::{DebugError, Result};
use crate::frame::{ExceptionInfo, ExecutionEvent, FrameId, RecordedFrame, TraceDirective, Value};
use crate::signals::{lookup_signum, SignalRelay};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::BufRead;
use tracing::{debug, warn};

/// One line of a recorded event trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TraceRecord {
    Call {
        frame: RecordedFrame,
    },
    Line {
        frame: RecordedFrame,
    },
    Return {
        frame: RecordedFrame,
        #[serde(default)]
        value: Value,
    },
    Exception {
        frame: RecordedFrame,
        exception: ExceptionInfo,
    },
    /// A signal delivered while `frame` was executing.
    Signal {
        frame: RecordedFrame,
        signal: String,
    },
}

impl TraceRecord {
    pub fn frame_mut(&mut self) -> &mut RecordedFrame {
        match self {
            TraceRecord::Call { frame }
            | TraceRecord::Line { frame }
            | TraceRecord::Return { frame, .. }
            | TraceRecord::Exception { frame, .. }
            | TraceRecord::Signal { frame, .. } => frame,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events handed to the controller.
    pub dispatched: usize,
    /// Events dropped because their frame was pruned.
    pub pruned: usize,
    /// The controller detached before the trace ended.
    pub detached: bool,
}

/// Parse a JSON-lines trace; blank lines are skipped.
pub fn read_trace<R: BufRead>(reader: R) -> impl Iterator<Item = Result<TraceRecord>> {
    reader.lines().filter_map(|line| match line {
        Err(err) => Some(Err(DebugError::Io(err))),
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(DebugError::from)),
    })
}

/// Feed recorded events through `controller` the way an interpreter would,
/// honoring the directives it returns. Signals the relay's host caught
/// are delivered before the next record, in that record's frame.
pub fn replay_records<I>(
    controller: &mut ExecutionController,
    mut relay: Option<&mut SignalRelay>,
    records: I,
) -> Result<ReplaySummary>
where
    I: IntoIterator<Item = Result<TraceRecord>>,
{
    let mut pruned: HashSet<FrameId> = HashSet::new();
    let mut summary = ReplaySummary::default();

    for record in records {
        let mut record = record?;
        if let Some(relay) = relay.as_deref_mut() {
            if controller.poll_signals(relay, record.frame_mut()) == TraceDirective::Detach {
                debug!(events = summary.dispatched, "detached on a caught signal");
                summary.detached = true;
                break;
            }
        }

        let directive = match record {
            TraceRecord::Call { mut frame } => {
                pruned.remove(&frame.id);
                let directive = controller.dispatch(&mut frame, ExecutionEvent::Call);
                if directive == TraceDirective::SkipLines {
                    pruned.insert(frame.id);
                }
                directive
            }
            TraceRecord::Line { mut frame } => {
                if pruned.contains(&frame.id) {
                    summary.pruned += 1;
                    continue;
                }
                controller.dispatch(&mut frame, ExecutionEvent::Line)
            }
            TraceRecord::Return { mut frame, value } => {
                if pruned.remove(&frame.id) {
                    summary.pruned += 1;
                    continue;
                }
                controller.dispatch(&mut frame, ExecutionEvent::Return(&value))
            }
            TraceRecord::Exception {
                mut frame,
                exception,
            } => {
                if pruned.contains(&frame.id) {
                    summary.pruned += 1;
                    continue;
                }
                controller.dispatch(&mut frame, ExecutionEvent::Exception(&exception))
            }
            TraceRecord::Signal { mut frame, signal } => {
                let signum = lookup_signum(&signal)
                    .ok_or_else(|| DebugError::UnknownSignal(signal.clone()))?;
                match relay.as_deref_mut() {
                    Some(relay) => controller.deliver_signal(relay, signum, &mut frame),
                    None => {
                        warn!(%signal, "no signal relay, dropping signal");
                        continue;
                    }
                }
            }
        };

        summary.dispatched += 1;
        if directive == TraceDirective::Detach {
            debug!(events = summary.dispatched, "controller detached");
            summary.detached = true;
            break;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_trace_lines() {
        let text = r#"{"event": "call", "frame": {"id": 1, "code": {"function": "<module>", "filename": "/p.py", "first_line": 1}, "line": 1}}

{"event": "return", "frame": {"id": 1, "code": {"function": "<module>", "filename": "/p.py", "first_line": 1}, "line": 3}, "value": 4}
{"event": "bogus"}"#;
        let records: Vec<Result<TraceRecord>> = read_trace(text.as_bytes()).collect();
        assert_eq!(records.len(), 3);
        assert!(matches!(&records[0], Ok(TraceRecord::Call { frame }) if frame.thread == "MainThread"));
        assert!(matches!(&records[1], Ok(TraceRecord::Return { value, .. }) if value == 4));
        assert!(matches!(records[2], Err(DebugError::Json(_))));
    }
}
