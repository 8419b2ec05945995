use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical task identifier type used throughout the engine.
pub type TaskId = String;

/// Lifecycle state of a task within one plan execution.
///
/// - `Pending`: waiting for its dependencies (or for a worker slot).
/// - `InProgress`: the registered implementation is running.
/// - `Completed`: finished, successfully or not. A failed task is still
///   `Completed` so that its dependents can make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Pending
    }
}

impl TaskState {
    /// Style class used by the diagram renderer.
    pub fn style_class(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::InProgress => "inprogress",
            TaskState::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::InProgress => "in_progress",
            TaskState::Completed => "completed",
        };
        f.write_str(s)
    }
}
