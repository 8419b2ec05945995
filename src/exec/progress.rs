// src/exec/progress.rs

//! Display side channel for execution progress.

use tracing::{debug, info, warn};

use crate::types::TaskState;

/// Receives progress notifications from the coordinator.
///
/// Called from worker tasks, possibly concurrently; implementations must be
/// cheap and must not block.
pub trait ProgressSink: Send + Sync {
    fn state_changed(&self, task: &str, state: TaskState);

    /// A task failed; it will still be marked completed.
    fn task_failed(&self, task: &str, error: &str) {
        let _ = (task, error);
    }

    /// Partial output streamed by a running task.
    fn task_output(&self, task: &str, chunk: &str) {
        let _ = (task, chunk);
    }
}

/// Default sink: log everything via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn state_changed(&self, task: &str, state: TaskState) {
        match state {
            TaskState::Pending => debug!(task = %task, "task pending"),
            TaskState::InProgress => info!(task = %task, "task started"),
            TaskState::Completed => info!(task = %task, "task completed"),
        }
    }

    fn task_failed(&self, task: &str, error: &str) {
        warn!(task = %task, error = %error, "task failed");
    }

    fn task_output(&self, task: &str, chunk: &str) {
        debug!(task = %task, "output: {}", chunk);
    }
}
