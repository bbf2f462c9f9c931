//! Value -- the closed set of things a recipe variable can hold.
//!
//! Everything that flows through templates, conditions and loop state is one
//! of these variants, so coercion rules live in one place instead of being
//! implied by string formatting at each call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value stored in `Vars`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl Value {
    /// Build a number from an f64, collapsing exact integers to `Int`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Value::Int(n as i64)
        } else {
            Value::Float(n)
        }
    }

    /// Text form used when a value is substituted into a command.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::List(items) => items.join("\n"),
        }
    }

    /// Numeric view. `"false"` is 0 and `"true"` is 1 so that missing data
    /// (rendered as `false`) compares as zero.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => parse_number(s),
            Value::List(_) => None,
        }
    }

    /// Integer view; floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => {
                let t = s.trim();
                match t {
                    "false" | "" => Some(0),
                    "true" => Some(1),
                    _ => t
                        .parse::<i64>()
                        .ok()
                        .or_else(|| parse_number(t).filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                }
            }
            other => other
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64),
        }
    }

    /// Truthiness as used by template `if` blocks and logic helpers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => {
                let t = s.trim();
                !(t.is_empty() || t == "false" || t == "0")
            }
            Value::List(items) => !items.is_empty(),
        }
    }

    /// List view. Strings split into trimmed, non-empty lines.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            other => split_lines(&other.render()),
        }
    }

    /// Interpret raw command output or a CLI `--var` string.
    pub fn from_output(raw: &str) -> Self {
        let t = raw.trim();
        match t {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                if let Ok(n) = t.parse::<i64>() {
                    Value::Int(n)
                } else {
                    Value::Str(t.to_string())
                }
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// Render a float, dropping the decimal point for exact integers.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Parse integers first, then floats; `false`/`true` map to 0/1.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    match t {
        "false" => Some(0.0),
        "true" => Some(1.0),
        _ => t
            .parse::<i64>()
            .map(|n| n as f64)
            .ok()
            .or_else(|| t.parse::<f64>().ok()),
    }
}

/// Newline-delimited text to trimmed, non-empty items, in order.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
