//! Sous - a recipe execution engine
//!
//! Recipes are YAML documents describing a graph of shell operations:
//! templated commands, `for`/`foreach`/`while` loops, success and failure
//! handlers, prompts, background tasks and reusable components.
//!
//! # Quick Start
//!
//! ```ignore
//! use sous::{Config, ComponentRegistry, Engine, Recipe, StaticPrompter};
//! use std::sync::Arc;
//!
//! let recipe = Recipe::from_yaml(yaml)?;
//! let engine = Engine::new(Config::default(), ComponentRegistry::new(), Arc::new(StaticPrompter::new(true)));
//! let outcome = engine.run(&recipe, "", Default::default(), false).await?;
//! println!("{:?}", outcome.outputs);
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod output;
pub mod prompt;
pub mod recipe;
pub mod telemetry;

pub use config::Config;
pub use engine::value::Value;
pub use engine::{Engine, RunOutcome, Signal};
pub use errors::{RecipeError, Result};
pub use prompt::{PromptAnswer, PromptProvider, StaticPrompter, TerminalPrompter};
pub use recipe::{ComponentRegistry, Recipe};
