use std::path::PathBuf;
use thiserror::Error;

/// The central error type for recipe loading and execution.
///
/// Command failures are recoverable through `on_failure` handlers or the
/// continue/abort prompt; everything else aborts the owning operation and
/// propagates upward.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    #[error("Template execution error: {0}")]
    TemplateExecution(String),

    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Operation '{name}' runs in background mode but has no id")]
    MissingIdentifier { name: String },

    #[error("Command failed ({status}): {command}\n{stderr}")]
    CommandExecution {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Maximum recursion depth ({limit}) exceeded")]
    RecursionLimit { limit: usize },

    #[error("Unknown control flow type: {0}")]
    UnknownControlFlowType(String),

    #[error("Handler '{id}' does not match any operation")]
    UnknownHandler { id: String },

    #[error("Loop exceeded {limit} iterations")]
    LoopLimit { limit: usize },

    #[error("Recipe aborted by user")]
    UserAborted,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Invalid recipe: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecipeError {
    /// A user choosing "abort" is an outcome, not a crash.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, RecipeError::UserAborted)
    }

    /// Message stored into `Vars["error"]` when an operation fails.
    pub fn failure_message(&self) -> String {
        match self {
            RecipeError::CommandExecution { stderr, status, .. } if stderr.trim().is_empty() => {
                status.clone()
            }
            RecipeError::CommandExecution { stderr, .. } => stderr.trim().to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_COMMAND_ERROR: u8 = 3;
pub const EXIT_USER_ABORT: u8 = 130;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(recipe_err) = e.downcast_ref::<RecipeError>() {
        return match recipe_err {
            RecipeError::UserAborted => EXIT_USER_ABORT,
            RecipeError::Config(_)
            | RecipeError::Load { .. }
            | RecipeError::Yaml(_)
            | RecipeError::UnknownControlFlowType(_)
            | RecipeError::ComponentNotFound(_) => EXIT_CONFIG_ERROR,
            RecipeError::CommandExecution { .. } => EXIT_COMMAND_ERROR,
            _ => EXIT_ERROR,
        };
    }
    EXIT_ERROR
}
