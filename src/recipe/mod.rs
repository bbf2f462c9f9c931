//! Recipe documents: operations, control-flow configuration, prompts and
//! reusable components.

pub mod loader;
pub mod types;

pub use loader::{load_recipe, ComponentRegistry};
pub use types::{
    Component, ControlFlow, ExecutionMode, ForConfig, ForEachConfig, Operation, OutputFormat,
    PromptKind, PromptSpec, Recipe, WhileConfig,
};
