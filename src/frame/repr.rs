use super::Value;

/// Size-bounded representation of values, so that a huge or deeply nested
/// value cannot flood the output when an exception or return is reported.
#[derive(Debug, Clone)]
pub struct SafeRepr {
    pub maxstring: usize,
    pub maxother: usize,
    pub maxitems: usize,
    pub maxlevel: usize,
}

impl Default for SafeRepr {
    fn default() -> Self {
        Self {
            maxstring: 100,
            maxother: 60,
            maxitems: 10,
            maxlevel: 6,
        }
    }
}

impl SafeRepr {
    pub fn new(maxstring: usize, maxother: usize) -> Self {
        Self {
            maxstring,
            maxother,
            ..Self::default()
        }
    }

    pub fn repr(&self, value: &Value) -> String {
        self.repr_level(value, self.maxlevel)
    }

    fn repr_level(&self, value: &Value, level: usize) -> String {
        match value {
            Value::String(s) => {
                let quoted = format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"));
                elide(&quoted, self.maxstring)
            }
            Value::Array(items) => {
                if level == 0 {
                    return "[...]".to_string();
                }
                let mut parts: Vec<String> = items
                    .iter()
                    .take(self.maxitems)
                    .map(|item| self.repr_level(item, level - 1))
                    .collect();
                if items.len() > self.maxitems {
                    parts.push("...".to_string());
                }
                format!("[{}]", parts.join(", "))
            }
            Value::Object(map) => {
                if level == 0 {
                    return "{...}".to_string();
                }
                let mut parts: Vec<String> = map
                    .iter()
                    .take(self.maxitems)
                    .map(|(k, v)| format!("'{}': {}", k, self.repr_level(v, level - 1)))
                    .collect();
                if map.len() > self.maxitems {
                    parts.push("...".to_string());
                }
                format!("{{{}}}", parts.join(", "))
            }
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Number(n) => elide(&n.to_string(), self.maxother),
        }
    }
}

/// Keep the head and tail of `text`, joined by `...`, within `max` chars.
fn elide(text: &str, max: usize) -> String {
    let len = text.chars().count();
    if len <= max {
        return text.to_string();
    }
    let head = max.saturating_sub(3) / 2;
    let tail = max.saturating_sub(3) - head;
    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(len - tail).collect();
    format!("{start}...{end}")
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
