//! Recipe execution engine.
//!
//! [`Engine::run`] expands component references, seeds a fresh
//! [`ExecutionContext`], drives the top-level operations in order and waits
//! for every background unit before returning a [`RunOutcome`].

pub mod background;
pub mod command;
pub mod condition;
pub mod context;
pub mod control_flow;
pub mod executor;
pub mod expander;
pub mod template;
pub mod value;


use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::errors::Result;
use crate::output::Output;
use crate::prompt::PromptProvider;
use crate::recipe::{ComponentRegistry, Recipe};
use background::BackgroundTask;
use command::Dispatcher;
use context::ExecutionContext;
use executor::Executor;
pub use executor::Signal;
use value::Value;

/// Post-run view of a recipe's state
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// The run stopped early on an `exit` signal
    pub exited: bool,
    pub outputs: BTreeMap<String, String>,
    pub results: BTreeMap<String, bool>,
    pub tasks: Vec<BackgroundTask>,
    pub vars: BTreeMap<String, Value>,
    pub duration_ms: u64,
}

/// Recipe runner. Cheap to clone; each `run` gets its own context.
#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    registry: Arc<ComponentRegistry>,
    prompter: Arc<dyn PromptProvider>,
    workdir: PathBuf,
    output: Output,
}

impl Engine {
    pub fn new(config: Config, registry: ComponentRegistry, prompter: Arc<dyn PromptProvider>) -> Self {
        let output = Output {
            color: config.ui.color && crate::output::supports_color(),
            progress: config.ui.progress,
            ..Output::default()
        };
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            prompter,
            workdir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            output,
        }
    }

    /// Run commands from `dir` instead of the process working directory
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Run `recipe` with `input` as the carried data and `vars` layered over
    /// the recipe defaults.
    pub async fn run(
        &self,
        recipe: &Recipe,
        input: &str,
        vars: HashMap<String, Value>,
        debug: bool,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut op_map = HashMap::new();
        let ops = expander::expand(&recipe.operations, &self.registry, &mut op_map)?;

        let ctx = ExecutionContext::new(self.output.color);
        ctx.seed(&recipe.vars, &self.workdir, &vars, input);

        let exec = Executor {
            ctx: ctx.clone(),
            ops: Arc::new(op_map),
            input: Arc::from(input),
            dispatcher: Arc::new(Dispatcher::new(
                self.config.engine.shell.clone(),
                self.workdir.clone(),
                Duration::from_secs(self.config.engine.interrupt_grace_secs),
            )),
            prompter: self.prompter.clone(),
            output: Output {
                debug: debug || self.output.debug,
                ..self.output
            },
            max_depth: self.config.engine.max_depth,
            max_while_iterations: self.config.engine.max_while_iterations,
        };

        info!(recipe = %recipe.name, operations = ops.len(), "starting recipe");
        let mut result = Ok(Signal::Next);
        for op in &ops {
            // A stray `break` outside any loop has nothing to stop.
            match exec.execute_op(op, 0).await {
                Ok(Signal::Exit) => {
                    result = Ok(Signal::Exit);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        // Detached units are awaited whatever the main chain did.
        if ctx.in_flight() > 0 {
            info!(pending = ctx.in_flight(), "waiting for background tasks");
        }
        ctx.wait_for_background().await;

        let signal = result?;
        let outcome = RunOutcome {
            exited: signal == Signal::Exit,
            outputs: ctx.outputs(),
            results: ctx.results(),
            tasks: ctx.tasks(),
            vars: ctx.vars(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            recipe = %recipe.name,
            exited = outcome.exited,
            duration_ms = outcome.duration_ms,
            "recipe finished"
        );
        Ok(outcome)
    }
}
