//! A small expression evaluator for conditions and display expressions on
//! recorded frames: literals, names, arithmetic, comparisons and boolean
//! operators with Python-style truthiness.

use super::Value;
use crate::error::EvalError;
use serde_json::Number;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: [&str; 12] = [
    "==", "!=", "<=", ">=", "//", "<", ">", "+", "-", "*", "/", "%",
];

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let syntax = || EvalError::Syntax(src.to_string());
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if ch == '(' {
            tokens.push(Token::LParen);
            i += 1;
            continue;
        }
        if ch == ')' {
            tokens.push(Token::RParen);
            i += 1;
            continue;
        }
        if ch.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                if chars[i] == '.' {
                    if is_float {
                        return Err(syntax());
                    }
                    is_float = true;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let token = if is_float {
                Token::Float(text.parse().map_err(|_| syntax())?)
            } else {
                Token::Int(text.parse().map_err(|_| syntax())?)
            };
            tokens.push(token);
            continue;
        }
        if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
            continue;
        }
        if ch == '"' || ch == '\'' {
            let quote = ch;
            let mut text = String::new();
            i += 1;
            loop {
                let c = *chars.get(i).ok_or_else(syntax)?;
                i += 1;
                if c == quote {
                    break;
                }
                if c == '\\' {
                    let escaped = *chars.get(i).ok_or_else(syntax)?;
                    i += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    text.push(c);
                }
            }
            tokens.push(Token::Str(text));
            continue;
        }

        let rest: String = chars[i..].iter().take(2).collect();
        let op = OPERATORS
            .iter()
            .copied()
            .find(|op| rest.starts_with(*op))
            .ok_or_else(syntax)?;
        tokens.push(Token::Op(op));
        i += op.len();
    }

    Ok(tokens)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<Value>,
}

impl Parser<'_> {
    fn syntax(&self) -> EvalError {
        EvalError::Syntax(self.src.to_string())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return None,
        };
        let found = ops.iter().copied().find(|o| *o == op)?;
        self.pos += 1;
        Some(found)
    }

    fn or_expr(&mut self) -> Result<Value, EvalError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            if !truthy(&left) {
                left = right;
            }
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Value, EvalError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            if truthy(&left) {
                left = right;
            }
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Value, EvalError> {
        if self.eat_keyword("not") {
            let value = self.not_expr()?;
            return Ok(Value::Bool(!truthy(&value)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Value, EvalError> {
        let mut left = self.sum()?;
        let mut result: Option<bool> = None;
        while let Some(op) = self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) {
            let right = self.sum()?;
            let holds = compare(op, &left, &right)?;
            result = Some(result.unwrap_or(true) && holds);
            left = right;
        }
        Ok(match result {
            Some(holds) => Value::Bool(holds),
            None => left,
        })
    }

    fn sum(&mut self) -> Result<Value, EvalError> {
        let mut left = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.term()?;
            left = arithmetic(op, &left, &right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Value, EvalError> {
        let mut left = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "//", "/", "%"]) {
            let right = self.unary()?;
            left = arithmetic(op, &left, &right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, EvalError> {
        if self.eat_op(&["-"]).is_some() {
            let value = self.unary()?;
            return arithmetic("-", &Value::from(0), &value);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, EvalError> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Value::from(n)),
            Some(Token::Float(f)) => Ok(float_value(f)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::LParen) => {
                let value = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(self.syntax()),
                }
            }
            Some(Token::Name(name)) => match name.as_str() {
                "True" | "true" => Ok(Value::Bool(true)),
                "False" | "false" => Ok(Value::Bool(false)),
                "None" | "null" => Ok(Value::Null),
                _ => (self.lookup)(&name).ok_or(EvalError::NoSymbol(name)),
            },
            _ => Err(self.syntax()),
        }
    }
}

/// Evaluate `src`, resolving free names through `lookup`.
pub fn evaluate(src: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> Result<Value, EvalError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax(src.to_string()));
    }
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        lookup,
    };
    let value = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.syntax());
    }
    Ok(value)
}

/// Python truthiness over JSON values.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        _ => None,
    }
}

fn to_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Float(f) => *f,
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op,
        super::type_name(left),
        super::type_name(right)
    ))
}

fn arithmetic(op: &str, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Value::String(a), Value::String(b), "+") = (left, right, op) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    let (a, b) = match (as_num(left), as_num(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(type_error(op, left, right)),
    };

    if let (Num::Int(x), Num::Int(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        let overflow = || EvalError::Type("integer overflow".to_string());
        let zero = || EvalError::Type("division by zero".to_string());
        return match op {
            "+" => x.checked_add(y).map(Value::from).ok_or_else(overflow),
            "-" => x.checked_sub(y).map(Value::from).ok_or_else(overflow),
            "*" => x.checked_mul(y).map(Value::from).ok_or_else(overflow),
            "/" if y == 0 => Err(zero()),
            "/" => Ok(float_value(x as f64 / y as f64)),
            "//" | "%" if y == 0 => Err(zero()),
            "//" => {
                let q = x.checked_div_euclid(y).ok_or_else(overflow)?;
                let r = x.checked_rem_euclid(y).ok_or_else(overflow)?;
                Ok(Value::from(q - i64::from(y < 0 && r != 0)))
            }
            "%" => {
                let r = x.checked_rem_euclid(y).ok_or_else(overflow)?;
                Ok(Value::from(if y < 0 && r != 0 { r + y } else { r }))
            }
            _ => Err(type_error(op, left, right)),
        };
    }

    let (x, y) = (to_f64(&a), to_f64(&b));
    match op {
        "+" => Ok(float_value(x + y)),
        "-" => Ok(float_value(x - y)),
        "*" => Ok(float_value(x * y)),
        "/" | "//" | "%" if y == 0.0 => Err(EvalError::Type("division by zero".to_string())),
        "/" => Ok(float_value(x / y)),
        "//" => Ok(float_value((x / y).floor())),
        "%" => Ok(float_value(x - y * (x / y).floor())),
        _ => Err(type_error(op, left, right)),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_num(left), as_num(right)) {
        (Some(a), Some(b)) => to_f64(&a) == to_f64(&b),
        _ => left == right,
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        "==" => return Ok(values_equal(left, right)),
        "!=" => return Ok(!values_equal(left, right)),
        _ => {}
    }
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => match (as_num(left), as_num(right)) {
            (Some(a), Some(b)) => to_f64(&a)
                .partial_cmp(&to_f64(&b))
                .ok_or_else(|| type_error(op, left, right))?,
            _ => return Err(type_error(op, left, right)),
        },
    };
    Ok(match op {
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        _ => unreachable!("comparison operators are filtered by the parser"),
    })
}
