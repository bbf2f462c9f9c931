//! Background tasks
//!
//! A `background` operation records a pending task and returns at once. The
//! command runs on its own tokio task; completion is published back into the
//! shared context and the operation's handler (if any) runs afterwards, with
//! no context lock held.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::executor::{Executor, Signal};
use crate::errors::{RecipeError, Result};
use crate::recipe::{ExecutionMode, Operation};

/// Placeholder published into outputs while a task runs
pub const PENDING: &str = "pending";

/// Lifecycle of a background task; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Complete => "complete",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Snapshot of one background task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: String,
    pub command: String,
    pub status: TaskStatus,
    pub output: String,
    pub error: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Distinguishes re-launches of the same id
    #[serde(skip)]
    pub run: Uuid,
}

impl BackgroundTask {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            status: TaskStatus::Pending,
            output: String::new(),
            error: String::new(),
            started_at: Utc::now(),
            finished_at: None,
            run: Uuid::new_v4(),
        }
    }

    /// Move to a terminal state. Returns false if already terminal.
    pub fn finish(&mut self, outcome: std::result::Result<String, String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            Ok(output) => {
                self.status = TaskStatus::Complete;
                self.output = output;
            }
            Err(error) => {
                self.status = TaskStatus::Failed;
                self.error = error;
            }
        }
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Task table keyed by operation id
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: HashMap<String, BackgroundTask>,
}

impl TaskTable {
    /// Register a task, replacing any earlier run under the same id.
    pub fn insert(&mut self, task: BackgroundTask) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &str) -> Option<&BackgroundTask> {
        self.tasks.get(id)
    }

    /// Finish the task if `run` is still the current launch for its id.
    pub fn finish(
        &mut self,
        id: &str,
        run: Uuid,
        outcome: std::result::Result<String, String>,
    ) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) if task.run == run => task.finish(outcome),
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks ordered by start time
    pub fn snapshot(&self) -> Vec<BackgroundTask> {
        let mut tasks: Vec<BackgroundTask> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        tasks
    }
}

impl Executor {
    /// Launch `command` as a background unit for the operation `id`.
    pub(crate) fn spawn_background(
        &self,
        op: &Operation,
        id: &str,
        command: String,
        depth: usize,
    ) -> Result<Signal> {
        if id.is_empty() {
            return Err(RecipeError::MissingIdentifier {
                name: op.label().to_string(),
            });
        }

        let signal = Signal::from_flags(op);
        let run = self.ctx.register_task(id, &command);
        let in_flight = self.ctx.begin_background();
        debug!(task = %id, depth, "background task started");

        let exec = self.clone();
        let op = op.clone();
        let id = id.to_string();

        tokio::spawn(async move {
            let _in_flight = in_flight;

            let outcome = match exec
                .dispatcher
                .execute(&command, &exec.input, ExecutionMode::Standard, op.output_format)
                .await
            {
                Ok(raw) => exec.apply_transform(&op, &raw),
                Err(e) => Err(e),
            };

            let succeeded = outcome.is_ok();
            let published = match outcome {
                Ok(output) => {
                    let output = output.trim().to_string();
                    let published = exec.ctx.finish_task(&id, run, Ok(output.clone()));
                    if published && !op.silent && !output.is_empty() {
                        exec.output.emit(&exec.ctx, &output);
                    }
                    published
                }
                Err(e) => {
                    warn!(task = %id, error = %e, "background task failed");
                    exec.ctx.finish_task(&id, run, Err(e.failure_message()))
                }
            };
            if !published {
                debug!(task = %id, "stale background result ignored");
                return;
            }

            let handler = if succeeded { &op.on_success } else { &op.on_failure };
            if !handler.is_empty() {
                if let Err(e) = exec.run_handler(handler, depth).await {
                    warn!(task = %id, handler = %handler, error = %e, "background handler failed");
                }
            }
        });

        Ok(signal)
    }
}
