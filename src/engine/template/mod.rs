//! Template Resolver
//!
//! Renders `{{ ... }}` templates against the current bindings. The language
//! is a small Go-template dialect: field references (`.name`), function calls
//! with pipelines, parenthesised sub-expressions, and `if`/`range` blocks.
//!
//! A reference to an absent variable never fails. It renders as the
//! [`NO_VALUE`] marker, which [`render`] rewrites to `false` so that later
//! boolean/numeric evaluation treats missing data as falsy/zero.

pub mod functions;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;

use crate::engine::background::BackgroundTask;
use crate::engine::value::Value;
use crate::errors::{RecipeError, Result};
use lexer::Lexer;
use parser::{Arg, Command, Node, Parser, Pipeline};

/// Marker emitted for missing data before post-processing
pub const NO_VALUE: &str = "<no value>";

/// Source of bindings a template is rendered against.
///
/// The execution context implements this, closing over its background-task
/// table so the `task*` functions can see live task state.
pub trait TemplateData {
    /// Resolve `.name`
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Background task snapshot by id
    fn task(&self, _id: &str) -> Option<BackgroundTask> {
        None
    }

    /// Number of background tasks still pending
    fn pending_tasks(&self) -> usize {
        0
    }

    /// Whether color helpers emit ANSI sequences
    fn color_enabled(&self) -> bool {
        std::env::var_os("NO_COLOR").is_none()
    }
}

impl TemplateData for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Bindings layered over another source; used to expose `.output` to
/// transforms without touching `Vars`.
pub struct Overlay<'a> {
    pub base: &'a dyn TemplateData,
    pub extra: HashMap<String, Value>,
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a dyn TemplateData) -> Self {
        Self {
            base,
            extra: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

impl TemplateData for Overlay<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.extra
            .get(name)
            .cloned()
            .or_else(|| self.base.lookup(name))
    }

    fn task(&self, id: &str) -> Option<BackgroundTask> {
        self.base.task(id)
    }

    fn pending_tasks(&self) -> usize {
        self.base.pending_tasks()
    }

    fn color_enabled(&self) -> bool {
        self.base.color_enabled()
    }
}

/// True when the text contains template delimiters
pub fn has_template(text: &str) -> bool {
    text.contains(lexer::LEFT_DELIM)
}

/// Parse a template into its node tree
pub fn parse(template: &str) -> Result<Vec<Node>> {
    Parser::new(Lexer::new(template).items()?).parse()
}

/// Render a template and rewrite any residual [`NO_VALUE`] marker to `false`.
pub fn render(template: &str, data: &dyn TemplateData) -> Result<String> {
    Ok(render_raw(template, data)?.replace(NO_VALUE, "false"))
}

/// Render without post-processing the missing-value marker
pub fn render_raw(template: &str, data: &dyn TemplateData) -> Result<String> {
    if !has_template(template) {
        return Ok(template.to_string());
    }
    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    Evaluator { data }.walk(&nodes, None, &mut out)?;
    Ok(out)
}

/// Result of evaluating an operand
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Value(Value),
    Missing,
}

impl Operand {
    fn into_value(self) -> Value {
        match self {
            Operand::Value(v) => v,
            Operand::Missing => Value::Bool(false),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Operand::Value(v) => v.is_truthy(),
            Operand::Missing => false,
        }
    }
}

struct Evaluator<'a> {
    data: &'a dyn TemplateData,
}

impl Evaluator<'_> {
    fn walk(&self, nodes: &[Node], dot: Option<&Value>, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Action(p) => match self.pipeline(p, dot)? {
                    Operand::Value(v) => out.push_str(&v.render()),
                    Operand::Missing => out.push_str(NO_VALUE),
                },
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.pipeline(cond, dot)?.is_truthy() {
                            self.walk(body, dot, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let items = match self.pipeline(pipeline, dot)? {
                        Operand::Value(v) => v.as_list(),
                        Operand::Missing => Vec::new(),
                    };
                    if items.is_empty() {
                        self.walk(otherwise, dot, out)?;
                    }
                    for item in items {
                        let element = Value::Str(item);
                        self.walk(body, Some(&element), out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn pipeline(&self, pipeline: &Pipeline, dot: Option<&Value>) -> Result<Operand> {
        let mut piped: Option<Operand> = None;
        for command in &pipeline.commands {
            piped = Some(self.command(command, dot, piped)?);
        }
        Ok(piped.unwrap_or(Operand::Missing))
    }

    fn command(&self, command: &Command, dot: Option<&Value>, piped: Option<Operand>) -> Result<Operand> {
        let (head, rest) = match command.args.split_first() {
            Some(split) => split,
            None => return Err(RecipeError::TemplateSyntax("empty command".into())),
        };

        if let Arg::Function(name) = head {
            let mut args = Vec::with_capacity(rest.len() + 1);
            for arg in rest {
                args.push(self.operand(arg, dot)?.into_value());
            }
            if let Some(p) = piped {
                args.push(p.into_value());
            }
            return functions::call(name, &args, self.data)
                .map(Operand::Value)
                .map_err(|e| RecipeError::TemplateExecution(format!("{}: {}", name, e)));
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(RecipeError::TemplateExecution(format!(
                "can't give argument to non-function {:?}",
                head
            )));
        }
        self.operand(head, dot)
    }

    fn operand(&self, arg: &Arg, dot: Option<&Value>) -> Result<Operand> {
        Ok(match arg {
            Arg::Field(name) => self
                .data
                .lookup(name)
                .map(Operand::Value)
                .unwrap_or(Operand::Missing),
            Arg::Dot => dot
                .cloned()
                .map(Operand::Value)
                .unwrap_or(Operand::Missing),
            Arg::Literal(v) => Operand::Value(v.clone()),
            Arg::Sub(p) => self.pipeline(p, dot)?,
            Arg::Function(name) => {
                // Zero-argument call used as an operand, e.g. `eq tasksPending 0`
                Operand::Value(
                    functions::call(name, &[], self.data)
                        .map_err(|e| RecipeError::TemplateExecution(format!("{}: {}", name, e)))?,
                )
            }
        })
    }
}
