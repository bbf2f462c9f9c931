//! Control-Flow Executor
//!
//! `for`, `foreach` and `while` drivers. Each pushes a loop context and binds
//! its variables through drop guards, so the loop is popped and `i`/`item`/
//! `iteration` are removed on every exit path, errors included.

use tracing::debug;

use super::condition;
use super::context::{BoundVars, ExecutionContext, LoopGuard};
use super::executor::{Executor, Signal};
use super::template;
use super::value::{split_lines, Value};
use crate::errors::{RecipeError, Result};
use crate::recipe::{ControlFlow, ForConfig, ForEachConfig, Operation, WhileConfig};

const ITERATION: &str = "iteration";

/// Drive `op`'s children according to `flow`.
///
/// `Break` is consumed by the loop; `Exit` propagates. After a normal
/// completion the loop operation's own flags apply.
pub(crate) async fn execute(
    exec: &Executor,
    flow: &ControlFlow,
    op: &Operation,
    id: &str,
    depth: usize,
) -> Result<Signal> {
    let ctx = &exec.ctx;
    let _progress = ProgressScope::enter(exec, flow.progress());

    let signal = match flow {
        ControlFlow::For(cfg) => run_for(exec, cfg, op, depth).await?,
        ControlFlow::ForEach(cfg) => run_foreach(exec, cfg, op, depth).await?,
        ControlFlow::While(cfg) => run_while(exec, cfg, op, depth).await?,
    };
    if signal == Signal::Exit {
        return Ok(Signal::Exit);
    }

    if !id.is_empty() {
        ctx.set_result(id, true);
    }
    Ok(Signal::from_flags(op))
}

/// Run one iteration's body. `Some(signal)` ends the loop.
async fn iteration(exec: &Executor, op: &Operation, guard: &LoopGuard, depth: usize) -> Result<Option<Signal>> {
    let signal = exec.execute_list(&op.operations, depth + 1).await?;
    guard.tick();
    Ok(match signal {
        Signal::Next => None,
        other => Some(other),
    })
}

async fn run_for(exec: &Executor, cfg: &ForConfig, op: &Operation, depth: usize) -> Result<Signal> {
    let rendered = template::render(&cfg.count, &exec.ctx)?;
    let count: i64 = rendered.trim().parse().map_err(|_| {
        RecipeError::TemplateExecution(format!(
            "for loop count {:?} is not an integer",
            rendered.trim()
        ))
    })?;
    let total = count.max(0) as usize;

    let guard = exec.ctx.push_loop("for", depth);
    let _bound = BoundVars::new(&exec.ctx, &[cfg.variable.as_str(), ITERATION]);
    debug!(op = %op.label(), count, variable = %cfg.variable, "for loop");

    for i in 0..total {
        exec.ctx.set_var(cfg.variable.as_str(), Value::Int(i as i64));
        exec.ctx.set_var(ITERATION, Value::Int(i as i64 + 1));
        let stop = iteration(exec, op, &guard, depth).await?;
        if cfg.progress_bar {
            exec.output.progress_bar(i + 1, total);
        }
        match stop {
            Some(Signal::Exit) => return Ok(Signal::Exit),
            Some(_) => break,
            None => {}
        }
    }
    Ok(Signal::Next)
}

async fn run_foreach(exec: &Executor, cfg: &ForEachConfig, op: &Operation, depth: usize) -> Result<Signal> {
    let rendered = template::render(&cfg.collection, &exec.ctx)?;
    let items = split_lines(&rendered);

    let guard = exec.ctx.push_loop("foreach", depth);
    let _bound = BoundVars::new(&exec.ctx, &[cfg.alias.as_str(), ITERATION]);
    debug!(op = %op.label(), items = items.len(), alias = %cfg.alias, "foreach loop");

    for (i, item) in items.into_iter().enumerate() {
        exec.ctx.set_var(cfg.alias.as_str(), Value::Str(item));
        exec.ctx.set_var(ITERATION, Value::Int(i as i64 + 1));
        match iteration(exec, op, &guard, depth).await? {
            Some(Signal::Exit) => return Ok(Signal::Exit),
            Some(_) => break,
            None => {}
        }
    }
    Ok(Signal::Next)
}

async fn run_while(exec: &Executor, cfg: &WhileConfig, op: &Operation, depth: usize) -> Result<Signal> {
    let limit = exec.max_while_iterations;
    let guard = exec.ctx.push_loop("while", depth);
    let _bound = BoundVars::new(&exec.ctx, &[ITERATION]);
    debug!(op = %op.label(), condition = %cfg.condition, "while loop");

    let mut n: usize = 0;
    while condition::evaluate(&cfg.condition, &exec.ctx)? {
        if limit > 0 && n >= limit {
            return Err(RecipeError::LoopLimit { limit });
        }
        n += 1;
        exec.ctx.set_var(ITERATION, Value::Int(n as i64));
        match iteration(exec, op, &guard, depth).await? {
            Some(Signal::Exit) => return Ok(Signal::Exit),
            Some(_) => break,
            None => {}
        }
    }
    Ok(Signal::Next)
}

/// Condensed output for the duration of a loop
struct ProgressScope {
    ctx: Option<(ExecutionContext, bool)>,
    output: crate::output::Output,
}

impl ProgressScope {
    fn enter(exec: &Executor, on: bool) -> Self {
        let ctx = on.then(|| {
            let previous = exec.ctx.set_progress_mode(true);
            (exec.ctx.clone(), previous)
        });
        Self {
            ctx,
            output: exec.output,
        }
    }
}

impl Drop for ProgressScope {
    fn drop(&mut self) {
        if let Some((ctx, previous)) = self.ctx.take() {
            ctx.set_progress_mode(previous);
            if !previous {
                self.output.end_condensed();
            }
        }
    }
}
