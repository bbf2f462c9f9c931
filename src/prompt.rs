//! Prompt answers
//!
//! The engine asks a [`PromptProvider`] for each prompt spec and for the
//! continue/abort decision after an unhandled command failure. Widgets are
//! out of scope here: [`TerminalPrompter`] reads plain lines from stdin and
//! [`StaticPrompter`] answers from a preset map.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use crate::engine::value::Value;
use crate::errors::{RecipeError, Result};
use crate::recipe::{PromptKind, PromptSpec};

/// Selection text that ends the whole recipe
pub const EXIT_CHOICE: &str = "exit";

/// Typed answer to a prompt
#[derive(Debug, Clone, PartialEq)]
pub enum PromptAnswer {
    Text(String),
    Bool(bool),
    List(Vec<String>),
    Int(i64),
    /// The operator picked "exit" from a select/autocomplete prompt
    Exit,
}

impl PromptAnswer {
    /// Value stored into `Vars`; `Exit` has none.
    pub fn into_value(self) -> Option<Value> {
        match self {
            PromptAnswer::Text(s) => Some(Value::Str(s)),
            PromptAnswer::Bool(b) => Some(Value::Bool(b)),
            PromptAnswer::List(items) => Some(Value::List(items)),
            PromptAnswer::Int(n) => Some(Value::Int(n)),
            PromptAnswer::Exit => None,
        }
    }
}

/// Source of prompt answers. The engine calls providers on the blocking
/// thread pool, so implementations may block on a terminal.
pub trait PromptProvider: Send + Sync {
    /// Answer one prompt. The spec's message is already rendered.
    fn ask(&self, spec: &PromptSpec) -> Result<PromptAnswer>;

    /// Whether to continue after `op` failed with `error` and had no handler
    fn confirm_continue(&self, op: &str, error: &RecipeError) -> Result<bool>;
}

/// Interpret free-form text as the answer type of `spec`.
///
/// An empty reply falls back to the spec's default, then to the first option.
pub fn parse_answer(spec: &PromptSpec, reply: &str) -> Result<PromptAnswer> {
    let reply = reply.trim();
    let default = spec.default.as_ref();

    match spec.kind {
        PromptKind::Confirm => Ok(PromptAnswer::Bool(if reply.is_empty() {
            default.map(Value::is_truthy).unwrap_or(false)
        } else {
            matches!(reply.to_lowercase().as_str(), "y" | "yes" | "true" | "1")
        })),
        PromptKind::Number => {
            if reply.is_empty() {
                return Ok(PromptAnswer::Int(
                    default.and_then(Value::as_i64).unwrap_or(0),
                ));
            }
            reply
                .parse::<i64>()
                .map(PromptAnswer::Int)
                .map_err(|_| RecipeError::Prompt(format!("{:?} is not a number", reply)))
        }
        PromptKind::Select | PromptKind::Autocomplete => {
            if reply.eq_ignore_ascii_case(EXIT_CHOICE) {
                return Ok(PromptAnswer::Exit);
            }
            if reply.is_empty() {
                let fallback = default
                    .map(Value::render)
                    .or_else(|| spec.options.first().cloned())
                    .unwrap_or_default();
                return Ok(PromptAnswer::Text(fallback));
            }
            Ok(PromptAnswer::Text(pick_option(&spec.options, reply)?))
        }
        PromptKind::Multiselect => {
            if reply.is_empty() {
                return Ok(PromptAnswer::List(
                    default.map(Value::as_list).unwrap_or_default(),
                ));
            }
            let picked = reply
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| pick_option(&spec.options, s))
                .collect::<Result<Vec<_>>>()?;
            Ok(PromptAnswer::List(picked))
        }
        PromptKind::Input | PromptKind::Text | PromptKind::Password => {
            if reply.is_empty() {
                Ok(PromptAnswer::Text(
                    default.map(Value::render).unwrap_or_default(),
                ))
            } else {
                Ok(PromptAnswer::Text(reply.to_string()))
            }
        }
    }
}

/// Accept a 1-based option number or the option text itself
fn pick_option(options: &[String], reply: &str) -> Result<String> {
    if options.is_empty() {
        return Ok(reply.to_string());
    }
    if let Ok(n) = reply.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Ok(options[n - 1].clone());
        }
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(reply))
        .cloned()
        .ok_or_else(|| RecipeError::Prompt(format!("{:?} is not one of the options", reply)))
}

/// Line-based prompter on stderr/stdin
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self, prompt: &str) -> Result<String> {
        eprint!("{}", prompt);
        io::stderr().flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(RecipeError::Prompt("stdin closed".to_string()));
        }
        Ok(line)
    }
}

impl PromptProvider for TerminalPrompter {
    fn ask(&self, spec: &PromptSpec) -> Result<PromptAnswer> {
        let label = if spec.message.is_empty() {
            spec.key()
        } else {
            spec.message.as_str()
        };
        if !spec.options.is_empty() {
            eprintln!("{}", label);
            for (i, option) in spec.options.iter().enumerate() {
                eprintln!("  {}) {}", i + 1, option);
            }
        }
        let suffix = match (&spec.kind, &spec.default) {
            (PromptKind::Confirm, _) => " [y/N]: ".to_string(),
            (_, Some(d)) => format!(" [{}]: ", d.render()),
            _ => ": ".to_string(),
        };
        let prompt = if spec.options.is_empty() {
            format!("{}{}", label, suffix)
        } else {
            format!("> {}", suffix.trim_start())
        };
        loop {
            let reply = self.read_line(&prompt)?;
            match parse_answer(spec, &reply) {
                Ok(answer) => return Ok(answer),
                Err(RecipeError::Prompt(msg)) => eprintln!("{}", msg),
                Err(e) => return Err(e),
            }
        }
    }

    fn confirm_continue(&self, op: &str, error: &RecipeError) -> Result<bool> {
        eprintln!("Operation '{}' failed: {}", op, error.failure_message());
        let reply = self.read_line("Continue with the recipe? [y/N]: ")?;
        Ok(matches!(reply.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Preset answers keyed by prompt id-or-name (`--yes` runs and tests)
#[derive(Debug, Default)]
pub struct StaticPrompter {
    answers: Mutex<HashMap<String, Vec<String>>>,
    continue_on_failure: bool,
}

impl StaticPrompter {
    pub fn new(continue_on_failure: bool) -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            continue_on_failure,
        }
    }

    /// Queue a reply for `key`; repeated prompts consume replies in order and
    /// the last one is reused once the queue is down to one.
    pub fn answer(self, key: impl Into<String>, reply: impl Into<String>) -> Self {
        self.answers
            .lock()
            .entry(key.into())
            .or_default()
            .push(reply.into());
        self
    }
}

impl PromptProvider for StaticPrompter {
    fn ask(&self, spec: &PromptSpec) -> Result<PromptAnswer> {
        let reply = {
            let mut answers = self.answers.lock();
            match answers.get_mut(spec.key()) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) => queue.first().cloned().unwrap_or_default(),
                None => String::new(),
            }
        };
        parse_answer(spec, &reply)
    }

    fn confirm_continue(&self, _op: &str, _error: &RecipeError) -> Result<bool> {
        Ok(self.continue_on_failure)
    }
}
