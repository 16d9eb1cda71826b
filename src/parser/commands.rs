use crate::error::{DebugError, Result};

/// `[FILE:]LINE`; without a file the current frame's file is meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoTopic {
    Breakpoints,
    Display,
    Signals(Option<String>),
    Threads,
}

/// One debugger command line, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Break {
        location: Option<Location>,
        temporary: bool,
        condition: Option<String>,
        thread: Option<String>,
    },
    Clear(Option<Location>),
    /// Empty means every breakpoint.
    Delete(Vec<usize>),
    Condition {
        number: usize,
        condition: Option<String>,
    },
    Ignore {
        number: usize,
        count: u32,
    },
    Enable(Vec<usize>),
    Disable(Vec<usize>),
    Step(u32),
    Next(u32),
    Continue,
    Return,
    Quit,
    Handle {
        signal: String,
        modifiers: Vec<String>,
    },
    Display {
        expression: Option<String>,
        format: Option<String>,
    },
    Undisplay(Vec<usize>),
    Info(InfoTopic),
    Thread(Vec<String>),
    Print(String),
}

/// Blank lines and `#` comments in command files.
pub fn is_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    if let Some((base, format)) = verb.split_once('/') {
        if matches!(base, "disp" | "display") {
            return Ok(parse_display(&format!("/{format} {rest}")));
        }
    }

    match verb {
        "b" | "break" => parse_break(rest, false),
        "tb" | "tbreak" => parse_break(rest, true),
        "cl" | "clear" => Ok(Command::Clear(optional_location(rest)?)),
        "d" | "delete" => Ok(Command::Delete(parse_numbers(rest)?)),
        "condition" => {
            let (number, condition) = match rest.split_once(char::is_whitespace) {
                Some((number, condition)) => (number, Some(condition.trim().to_string())),
                None => (rest, None),
            };
            Ok(Command::Condition {
                number: parse_number(number)?,
                condition: condition.filter(|c| !c.is_empty()),
            })
        }
        "ignore" => {
            let words = split_words(rest)?;
            match words.as_slice() {
                [number, count] => Ok(Command::Ignore {
                    number: parse_number(number)?,
                    count: count.parse().map_err(|_| {
                        DebugError::InvalidArgument(format!("bad ignore count \"{count}\""))
                    })?,
                }),
                _ => Err(DebugError::InvalidArgument(
                    "usage: ignore NUMBER COUNT".to_string(),
                )),
            }
        }
        "enable" => Ok(Command::Enable(parse_numbers(rest)?)),
        "disable" => Ok(Command::Disable(parse_numbers(rest)?)),
        "s" | "step" => Ok(Command::Step(parse_count(rest)?)),
        "n" | "next" => Ok(Command::Next(parse_count(rest)?)),
        "c" | "cont" | "continue" => Ok(Command::Continue),
        "return" | "fin" | "finish" => Ok(Command::Return),
        "q" | "quit" | "exit" => Ok(Command::Quit),
        "handle" => {
            let mut words = split_words(rest)?.into_iter();
            let signal = words.next().ok_or_else(|| {
                DebugError::InvalidArgument("Argument required (signal name)".to_string())
            })?;
            Ok(Command::Handle {
                signal,
                modifiers: words.collect(),
            })
        }
        "disp" | "display" => Ok(parse_display(rest)),
        "und" | "undisplay" => Ok(Command::Undisplay(parse_numbers(rest)?)),
        "i" | "info" => parse_info(rest),
        "thread" => Ok(Command::Thread(split_words(rest)?)),
        "p" | "print" => {
            if rest.is_empty() {
                return Err(DebugError::InvalidArgument(
                    "expression required".to_string(),
                ));
            }
            Ok(Command::Print(rest.to_string()))
        }
        other => Err(DebugError::UnknownCommand(other.to_string())),
    }
}

/// `break [LOCATION] [thread NAME] [if CONDITION]`
fn parse_break(rest: &str, temporary: bool) -> Result<Command> {
    let (head, condition) = split_condition(rest);
    let mut words = split_words(head)?.into_iter().peekable();

    let location = match words.peek() {
        Some(word) if word != "thread" => {
            let word = words.next().unwrap_or_default();
            Some(parse_location(&word)?)
        }
        _ => None,
    };

    let thread = match words.next() {
        Some(word) if word == "thread" => Some(words.next().ok_or_else(|| {
            DebugError::InvalidArgument("thread name required".to_string())
        })?),
        Some(word) => {
            return Err(DebugError::InvalidArgument(format!(
                "junk at end of arguments: \"{word}\""
            )))
        }
        None => None,
    };
    if let Some(word) = words.next() {
        return Err(DebugError::InvalidArgument(format!(
            "junk at end of arguments: \"{word}\""
        )));
    }

    Ok(Command::Break {
        location,
        temporary,
        condition,
        thread,
    })
}

/// Conditions are expressions and keep their raw text.
fn split_condition(rest: &str) -> (&str, Option<String>) {
    if let Some(condition) = rest.strip_prefix("if ") {
        return ("", Some(condition.trim().to_string()));
    }
    match rest.find(" if ") {
        Some(pos) => (&rest[..pos], Some(rest[pos + 4..].trim().to_string())),
        None => (rest, None),
    }
}

pub fn parse_location(text: &str) -> Result<Location> {
    let (file, line) = match text.rsplit_once(':') {
        Some((file, line)) if !file.is_empty() => (Some(file.to_string()), line),
        _ => (None, text),
    };
    let line = line
        .parse::<u32>()
        .ok()
        .filter(|line| *line > 0)
        .ok_or_else(|| DebugError::InvalidArgument(format!("bad line number in \"{text}\"")))?;
    Ok(Location { file, line })
}

fn optional_location(rest: &str) -> Result<Option<Location>> {
    if rest.is_empty() {
        Ok(None)
    } else {
        parse_location(rest).map(Some)
    }
}

fn parse_display(rest: &str) -> Command {
    let rest = rest.trim();
    if rest.is_empty() {
        return Command::Display {
            expression: None,
            format: None,
        };
    }
    if rest.starts_with('/') {
        let (format, expression) = match rest.split_once(char::is_whitespace) {
            Some((format, expression)) => (format, Some(expression.trim().to_string())),
            None => (rest, None),
        };
        return Command::Display {
            expression,
            format: Some(format.to_string()),
        };
    }
    Command::Display {
        expression: Some(rest.to_string()),
        format: None,
    }
}

fn parse_info(rest: &str) -> Result<Command> {
    let mut words = split_words(rest)?.into_iter();
    let topic = words
        .next()
        .ok_or_else(|| DebugError::InvalidArgument("info what?".to_string()))?;
    let topic = match topic.as_str() {
        "b" | "break" | "breakpoints" => InfoTopic::Breakpoints,
        "display" => InfoTopic::Display,
        "signal" | "signals" | "handle" => InfoTopic::Signals(words.next()),
        "thread" | "threads" => InfoTopic::Threads,
        other => return Err(DebugError::UnknownCommand(format!("info {other}"))),
    };
    Ok(Command::Info(topic))
}

fn split_words(text: &str) -> Result<Vec<String>> {
    shlex::split(text)
        .ok_or_else(|| DebugError::InvalidArgument(format!("unbalanced quotes in \"{text}\"")))
}

fn parse_number(text: &str) -> Result<usize> {
    text.trim()
        .parse()
        .map_err(|_| DebugError::InvalidArgument(format!("bad number \"{text}\"")))
}

fn parse_numbers(text: &str) -> Result<Vec<usize>> {
    split_words(text)?.iter().map(|word| parse_number(word)).collect()
}

fn parse_count(text: &str) -> Result<u32> {
    if text.is_empty() {
        return Ok(1);
    }
    match text.parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(DebugError::InvalidArgument(format!("bad count \"{text}\""))),
    }
}
