//! Recipe document model.
//!
//! Field names and the control-flow discriminants are the YAML wire format
//! and must not be renamed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::value::Value;
use crate::errors::RecipeError;

/// A named, top-level sequence of operations plus metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub help: String,
    /// Default variables, seeded before CLI vars
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Recipe {
    pub fn from_yaml(yaml: &str) -> Result<Self, RecipeError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// How a rendered command is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Standard,
    Interactive,
    Stream,
    Background,
}

impl ExecutionMode {
    /// Attached to the terminal rather than captured.
    pub fn is_attached(self) -> bool {
        matches!(self, ExecutionMode::Interactive | ExecutionMode::Stream)
    }
}

/// Post-processing applied to captured stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Raw,
    Trim,
    Lines,
}

/// One executable step: a command, a control-flow block, or a component reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    /// Handle for output/result lookup and handler targeting; may be a template
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_flow: Option<ControlFlow>,
    /// Children, meaningful only under `control_flow`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub silent: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_success: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_failure: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transform: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<PromptSpec>,
    #[serde(default, rename = "break")]
    pub break_loop: bool,
    #[serde(default)]
    pub exit: bool,
    /// Component reference, inlined by the expander
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uses: String,
    /// Set only on synthetic copy steps produced by component expansion
    #[serde(skip)]
    pub copy_from: Option<String>,
}

impl Operation {
    /// Name for display, falling back to the id and then the command.
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.id.is_empty() {
            &self.id
        } else {
            &self.command
        }
    }
}

/// Loop configuration, parsed once from the `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlFlow", into = "RawControlFlow")]
pub enum ControlFlow {
    For(ForConfig),
    ForEach(ForEachConfig),
    While(WhileConfig),
}

impl ControlFlow {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlFlow::For(_) => "for",
            ControlFlow::ForEach(_) => "foreach",
            ControlFlow::While(_) => "while",
        }
    }

    /// Condensed single-line output requested
    pub fn progress(&self) -> bool {
        match self {
            ControlFlow::For(c) => c.progress,
            ControlFlow::ForEach(c) => c.progress,
            ControlFlow::While(c) => c.progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForConfig {
    /// Template rendered once on entry and parsed as an integer
    pub count: String,
    pub variable: String,
    pub progress: bool,
    pub progress_bar: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachConfig {
    /// Template rendered once and split into newline-delimited items
    pub collection: String,
    pub alias: String,
    pub progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileConfig {
    /// Re-rendered and re-evaluated before every iteration
    pub condition: String,
    pub progress: bool,
}

fn default_for_variable() -> String {
    "i".to_string()
}

fn default_foreach_alias() -> String {
    "item".to_string()
}

/// Untyped `control_flow` mapping exactly as written in YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawControlFlow {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub progress_bar: bool,
}

impl TryFrom<RawControlFlow> for ControlFlow {
    type Error = RecipeError;

    fn try_from(raw: RawControlFlow) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "for" => {
                let count = match raw.count {
                    Some(serde_yaml::Value::Number(n)) => n.to_string(),
                    Some(serde_yaml::Value::String(s)) => s,
                    Some(other) => {
                        return Err(RecipeError::TemplateExecution(format!(
                            "for loop count must be a number or template, got {:?}",
                            other
                        )))
                    }
                    None => "0".to_string(),
                };
                Ok(ControlFlow::For(ForConfig {
                    count,
                    variable: raw
                        .variable
                        .filter(|v| !v.is_empty())
                        .unwrap_or_else(default_for_variable),
                    progress: raw.progress,
                    progress_bar: raw.progress_bar,
                }))
            }
            "foreach" => Ok(ControlFlow::ForEach(ForEachConfig {
                collection: raw.collection.unwrap_or_default(),
                alias: raw
                    .alias
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(default_foreach_alias),
                progress: raw.progress,
            })),
            "while" => Ok(ControlFlow::While(WhileConfig {
                condition: raw.condition.unwrap_or_default(),
                progress: raw.progress,
            })),
            other => Err(RecipeError::UnknownControlFlowType(other.to_string())),
        }
    }
}

impl From<ControlFlow> for RawControlFlow {
    fn from(flow: ControlFlow) -> Self {
        match flow {
            ControlFlow::For(c) => RawControlFlow {
                kind: "for".into(),
                count: Some(serde_yaml::Value::String(c.count)),
                variable: Some(c.variable),
                progress: c.progress,
                progress_bar: c.progress_bar,
                ..Default::default()
            },
            ControlFlow::ForEach(c) => RawControlFlow {
                kind: "foreach".into(),
                collection: Some(c.collection),
                alias: Some(c.alias),
                progress: c.progress,
                ..Default::default()
            },
            ControlFlow::While(c) => RawControlFlow {
                kind: "while".into(),
                condition: Some(c.condition),
                progress: c.progress,
                ..Default::default()
            },
        }
    }
}

/// Prompt widget kind; the engine only cares about the answer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    #[default]
    Input,
    Text,
    Password,
    Confirm,
    Select,
    Multiselect,
    Autocomplete,
    Number,
}

/// A question asked before an operation runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PromptKind,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl PromptSpec {
    /// Variable the answer is stored under.
    pub fn key(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}

/// A reusable fragment of operations, inlined by `uses: <id>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}
