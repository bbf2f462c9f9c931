//! Execution Context
//!
//! One instance per recipe run. Cloning the handle is cheap; every clone sees
//! the same store. Locks are held only for the duration of a single map
//! access and never across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::background::{BackgroundTask, TaskTable, PENDING};
use super::template::TemplateData;
use super::value::Value;

/// An active loop, top of the stack is the current loop.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub id: Uuid,
    pub kind: &'static str,
    pub depth: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    started: Instant,
}

#[derive(Debug, Default)]
struct Store {
    vars: HashMap<String, Value>,
    outputs: HashMap<String, String>,
    results: HashMap<String, bool>,
    loops: Vec<LoopContext>,
    progress: bool,
}

#[derive(Debug)]
struct Shared {
    store: Mutex<Store>,
    tasks: Mutex<TaskTable>,
    in_flight: watch::Sender<usize>,
    color: bool,
}

/// Shared handle to the per-run state
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    shared: Arc<Shared>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ExecutionContext {
    pub fn new(color: bool) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(Store::default()),
                tasks: Mutex::new(TaskTable::default()),
                in_flight,
                color,
            }),
        }
    }

    /// Seed in precedence order: recipe defaults, `workdir`, CLI vars, `input`.
    pub fn seed(
        &self,
        defaults: &BTreeMap<String, Value>,
        workdir: &Path,
        cli_vars: &HashMap<String, Value>,
        input: &str,
    ) {
        let mut store = self.shared.store.lock();
        for (k, v) in defaults {
            store.vars.insert(k.clone(), v.clone());
        }
        store.vars.insert(
            "workdir".to_string(),
            Value::Str(workdir.display().to_string()),
        );
        for (k, v) in cli_vars {
            store.vars.insert(k.clone(), v.clone());
        }
        store
            .vars
            .insert("input".to_string(), Value::Str(input.to_string()));
    }

    // ---- variables ------------------------------------------------------

    pub fn var(&self, name: &str) -> Option<Value> {
        self.shared.store.lock().vars.get(name).cloned()
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.shared
            .store
            .lock()
            .vars
            .insert(name.into(), value.into());
    }

    pub fn remove_var(&self, name: &str) -> Option<Value> {
        self.shared.store.lock().vars.remove(name)
    }

    pub fn vars(&self) -> BTreeMap<String, Value> {
        self.shared
            .store
            .lock()
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ---- outputs and results --------------------------------------------

    pub fn output(&self, id: &str) -> Option<String> {
        self.shared.store.lock().outputs.get(id).cloned()
    }

    pub fn set_output(&self, id: impl Into<String>, output: impl Into<String>) {
        self.shared
            .store
            .lock()
            .outputs
            .insert(id.into(), output.into());
    }

    pub fn result(&self, id: &str) -> Option<bool> {
        self.shared.store.lock().results.get(id).copied()
    }

    pub fn set_result(&self, id: impl Into<String>, success: bool) {
        self.shared
            .store
            .lock()
            .results
            .insert(id.into(), success);
    }

    /// Copy output and result from one id to another
    pub fn copy_outcome(&self, from: &str, to: &str) -> Option<bool> {
        let mut store = self.shared.store.lock();
        if let Some(out) = store.outputs.get(from).cloned() {
            store.outputs.insert(to.to_string(), out);
        }
        let result = store.results.get(from).copied();
        if let Some(ok) = result {
            store.results.insert(to.to_string(), ok);
        }
        result
    }

    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.shared
            .store
            .lock()
            .outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn results(&self) -> BTreeMap<String, bool> {
        self.shared
            .store
            .lock()
            .results
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    // ---- loops ------------------------------------------------------------

    /// Push a loop; the returned guard pops it on every exit path.
    pub fn push_loop(&self, kind: &'static str, depth: usize) -> LoopGuard {
        let ctx = LoopContext {
            id: Uuid::new_v4(),
            kind,
            depth,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            started: Instant::now(),
        };
        let id = ctx.id;
        debug!(loop_id = %id, kind, depth, "loop entered");
        self.shared.store.lock().loops.push(ctx);
        LoopGuard {
            ctx: self.clone(),
            id,
        }
    }

    pub fn current_loop(&self) -> Option<LoopContext> {
        self.shared.store.lock().loops.last().cloned()
    }

    pub fn loop_depth(&self) -> usize {
        self.shared.store.lock().loops.len()
    }

    pub fn progress_mode(&self) -> bool {
        self.shared.store.lock().progress
    }

    /// Set the progress flag, returning the previous value
    pub fn set_progress_mode(&self, on: bool) -> bool {
        std::mem::replace(&mut self.shared.store.lock().progress, on)
    }

    pub fn color_enabled(&self) -> bool {
        self.shared.color
    }

    // ---- background tasks -------------------------------------------------

    /// Record a pending task and publish its placeholder. Returns the run token.
    pub fn register_task(&self, id: &str, command: &str) -> Uuid {
        let task = BackgroundTask::new(id, command);
        let run = task.run;
        self.shared.tasks.lock().insert(task);

        let mut store = self.shared.store.lock();
        store.outputs.insert(id.to_string(), PENDING.to_string());
        store.results.insert(id.to_string(), false);
        run
    }

    /// Publish a finished task into the task table, outputs, results and, on
    /// failure, `Vars["error"]`. Returns false for a superseded run.
    pub fn finish_task(
        &self,
        id: &str,
        run: Uuid,
        outcome: std::result::Result<String, String>,
    ) -> bool {
        if !self.shared.tasks.lock().finish(id, run, outcome.clone()) {
            return false;
        }
        let mut store = self.shared.store.lock();
        match outcome {
            Ok(output) => {
                store.outputs.insert(id.to_string(), output);
                store.results.insert(id.to_string(), true);
            }
            Err(error) => {
                store.outputs.insert(id.to_string(), String::new());
                store.results.insert(id.to_string(), false);
                store.vars.insert("error".to_string(), Value::Str(error));
            }
        }
        true
    }

    pub fn tasks(&self) -> Vec<BackgroundTask> {
        self.shared.tasks.lock().snapshot()
    }

    /// Count one more in-flight unit until the guard drops.
    pub fn begin_background(&self) -> InFlight {
        self.shared.in_flight.send_modify(|n| *n += 1);
        InFlight { ctx: self.clone() }
    }

    pub fn in_flight(&self) -> usize {
        *self.shared.in_flight.borrow()
    }

    /// Resolve once every background unit has finished
    pub async fn wait_for_background(&self) {
        let mut rx = self.shared.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl TemplateData for ExecutionContext {
    fn lookup(&self, name: &str) -> Option<Value> {
        let store = self.shared.store.lock();
        store
            .vars
            .get(name)
            .cloned()
            .or_else(|| store.outputs.get(name).map(|o| Value::Str(o.clone())))
    }

    fn task(&self, id: &str) -> Option<BackgroundTask> {
        self.shared.tasks.lock().get(id).cloned()
    }

    fn pending_tasks(&self) -> usize {
        self.shared.tasks.lock().pending()
    }

    fn color_enabled(&self) -> bool {
        self.shared.color
    }
}

/// Pops its loop when dropped
#[derive(Debug)]
pub struct LoopGuard {
    ctx: ExecutionContext,
    id: Uuid,
}

impl LoopGuard {
    /// Refresh the running duration of this loop
    pub fn tick(&self) {
        let mut store = self.ctx.shared.store.lock();
        if let Some(l) = store.loops.iter_mut().rev().find(|l| l.id == self.id) {
            l.duration = l.started.elapsed();
        }
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        let mut store = self.ctx.shared.store.lock();
        if let Some(pos) = store.loops.iter().rposition(|l| l.id == self.id) {
            let l = store.loops.remove(pos);
            debug!(loop_id = %l.id, kind = l.kind, elapsed_ms = l.started.elapsed().as_millis() as u64, "loop exited");
        }
    }
}

/// Loop-bound variables; on drop each is restored to its value from before
/// the loop, or removed if it had none.
#[derive(Debug)]
pub struct BoundVars {
    ctx: ExecutionContext,
    saved: Vec<(String, Option<Value>)>,
}

impl BoundVars {
    pub fn new(ctx: &ExecutionContext, names: &[&str]) -> Self {
        let store = ctx.shared.store.lock();
        let saved = names
            .iter()
            .map(|n| (n.to_string(), store.vars.get(*n).cloned()))
            .collect();
        Self {
            ctx: ctx.clone(),
            saved,
        }
    }
}

impl Drop for BoundVars {
    fn drop(&mut self) {
        let mut store = self.ctx.shared.store.lock();
        for (name, previous) in self.saved.drain(..) {
            match previous {
                Some(v) => store.vars.insert(name, v),
                None => store.vars.remove(&name),
            };
        }
    }
}

/// Decrements the in-flight counter when dropped
#[derive(Debug)]
pub struct InFlight {
    ctx: ExecutionContext,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.ctx
            .shared
            .in_flight
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}
