//! Operation Executor
//!
//! The recursive driver for one operation: id -> condition -> prompts ->
//! control flow or command -> result bookkeeping -> handlers.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::command::Dispatcher;
use super::condition;
use super::context::ExecutionContext;
use super::control_flow;
use super::template::{self, Overlay};
use crate::errors::{RecipeError, Result};
use crate::output::Output;
use crate::prompt::{PromptAnswer, PromptProvider};
use crate::recipe::{ExecutionMode, Operation, PromptSpec};
use crate::telemetry::sanitize_for_log;

/// Out-of-band control signal returned by every operation.
///
/// Ordered by strength so combining two signals keeps the stronger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signal {
    /// Carry on with the next operation
    Next,
    /// Stop the nearest enclosing loop
    Break,
    /// Stop the whole recipe, successfully
    Exit,
}

impl Signal {
    /// The signal an operation raises by itself once it has run
    pub fn from_flags(op: &Operation) -> Self {
        if op.exit {
            Signal::Exit
        } else if op.break_loop {
            Signal::Break
        } else {
            Signal::Next
        }
    }

    pub fn combine(self, other: Signal) -> Signal {
        self.max(other)
    }
}

/// Per-run execution state shared by the main chain and background units
#[derive(Clone)]
pub(crate) struct Executor {
    pub(crate) ctx: ExecutionContext,
    pub(crate) ops: Arc<HashMap<String, Operation>>,
    pub(crate) input: Arc<str>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) prompter: Arc<dyn PromptProvider>,
    pub(crate) output: Output,
    pub(crate) max_depth: usize,
    pub(crate) max_while_iterations: usize,
}

impl Executor {
    /// Run a list of operations in order, stopping at the first signal.
    pub(crate) async fn execute_list(&self, ops: &[Operation], depth: usize) -> Result<Signal> {
        for op in ops {
            let signal = self.execute_op(op, depth).await?;
            if signal != Signal::Next {
                return Ok(signal);
            }
        }
        Ok(Signal::Next)
    }

    pub(crate) fn execute_op<'a>(
        &'a self,
        op: &'a Operation,
        depth: usize,
    ) -> BoxFuture<'a, Result<Signal>> {
        Box::pin(async move {
            if depth > self.max_depth {
                return Err(RecipeError::RecursionLimit {
                    limit: self.max_depth,
                });
            }

            let id = if template::has_template(&op.id) {
                template::render(&op.id, &self.ctx)?.trim().to_string()
            } else {
                op.id.clone()
            };
            debug!(op = %op.label(), id = %id, depth, "executing operation");

            if !condition::evaluate(&op.condition, &self.ctx)? {
                debug!(op = %op.label(), "condition false, skipping");
                return Ok(Signal::Next);
            }

            for spec in &op.prompts {
                if self.ask(spec).await? {
                    debug!(op = %op.label(), "exit selected at prompt");
                    return Ok(Signal::Exit);
                }
            }

            if let Some(flow) = &op.control_flow {
                return control_flow::execute(self, flow, op, &id, depth).await;
            }

            if let Some(source) = &op.copy_from {
                return self.copy_step(op, source, &id, depth).await;
            }

            if op.command.trim().is_empty() {
                if !id.is_empty() {
                    self.ctx.set_result(&id, true);
                }
                return Ok(Signal::from_flags(op));
            }

            let command = template::render(&op.command, &self.ctx)?;
            self.output.trace_command(op.label(), &command);

            if op.execution_mode == ExecutionMode::Background {
                return self.spawn_background(op, &id, command, depth);
            }

            match self
                .dispatcher
                .execute(&command, &self.input, op.execution_mode, op.output_format)
                .await
            {
                Ok(raw) => self.succeeded(op, &id, &raw, depth).await,
                Err(err @ RecipeError::CommandExecution { .. }) => {
                    self.failed(op, &id, err, depth).await
                }
                Err(other) => Err(other),
            }
        })
    }

    /// Resolve one prompt into `Vars`. Returns true when "exit" was chosen.
    async fn ask(&self, spec: &PromptSpec) -> Result<bool> {
        let mut spec = spec.clone();
        if template::has_template(&spec.message) {
            spec.message = template::render(&spec.message, &self.ctx)?;
        }
        let key = spec.key().to_string();
        match self.prompt_blocking(move |p| p.ask(&spec)).await? {
            PromptAnswer::Exit => Ok(true),
            answer => {
                if let Some(value) = answer.into_value() {
                    self.ctx.set_var(key, value);
                }
                Ok(false)
            }
        }
    }

    /// Run a provider call on the blocking pool
    async fn prompt_blocking<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&dyn PromptProvider) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let prompter = Arc::clone(&self.prompter);
        tokio::task::spawn_blocking(move || call(prompter.as_ref()))
            .await
            .map_err(|e| RecipeError::Prompt(format!("prompt task failed: {}", e)))?
    }

    async fn succeeded(&self, op: &Operation, id: &str, raw: &str, depth: usize) -> Result<Signal> {
        let output = self.apply_transform(op, raw)?;
        let output = output.trim();
        if !id.is_empty() {
            self.ctx.set_output(id, output);
            self.ctx.set_result(id, true);
        }
        if !op.silent && !output.is_empty() && !op.execution_mode.is_attached() {
            self.output.emit(&self.ctx, output);
        }

        let own = Signal::from_flags(op);
        if op.on_success.is_empty() {
            return Ok(own);
        }
        Ok(self.run_handler(&op.on_success, depth).await?.combine(own))
    }

    async fn failed(&self, op: &Operation, id: &str, err: RecipeError, depth: usize) -> Result<Signal> {
        warn!(op = %op.label(), id = %id, error = %sanitize_for_log(&err.failure_message()), "operation failed");
        if !id.is_empty() {
            self.ctx.set_result(id, false);
        }
        self.ctx.set_var("error", err.failure_message());

        let own = Signal::from_flags(op);
        if !op.on_failure.is_empty() {
            return Ok(self.run_handler(&op.on_failure, depth).await?.combine(own));
        }

        self.output.failure(op.label(), &err.failure_message());
        let label = op.label().to_string();
        if self
            .prompt_blocking(move |p| p.confirm_continue(&label, &err))
            .await?
        {
            Ok(own)
        } else {
            Err(RecipeError::UserAborted)
        }
    }

    /// Republish a component's final outcome under the referencing id
    async fn copy_step(&self, op: &Operation, source: &str, id: &str, depth: usize) -> Result<Signal> {
        let outcome = if id.is_empty() {
            self.ctx.result(source)
        } else {
            self.ctx.copy_outcome(source, id)
        };
        debug!(from = %source, to = %id, ?outcome, "copied component outcome");

        // A source that never ran has no outcome to route on.
        let own = Signal::from_flags(op);
        let handler = match outcome {
            Some(true) => &op.on_success,
            Some(false) => &op.on_failure,
            None => return Ok(own),
        };
        if handler.is_empty() {
            return Ok(own);
        }
        Ok(self.run_handler(handler, depth).await?.combine(own))
    }

    /// Jump to the operation registered under `handler`
    pub(crate) async fn run_handler(&self, handler: &str, depth: usize) -> Result<Signal> {
        let target = self
            .ops
            .get(handler)
            .ok_or_else(|| RecipeError::UnknownHandler {
                id: handler.to_string(),
            })?;
        debug!(handler = %handler, depth = depth + 1, "following handler");
        self.execute_op(target, depth + 1).await
    }

    /// Apply `transform` with the raw output bound to `.output`
    pub(crate) fn apply_transform(&self, op: &Operation, raw: &str) -> Result<String> {
        if op.transform.is_empty() {
            return Ok(raw.to_string());
        }
        let data = Overlay::new(&self.ctx).with("output", raw.trim());
        template::render(&op.transform, &data)
    }
}
