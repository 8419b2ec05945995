// src/exec/context.rs

//! Inputs handed to a task implementation.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::exec::coordinator::CoordinatorHandle;
use crate::exec::progress::ProgressSink;
use crate::plan::TaskDescriptor;
use crate::types::TaskId;

/// Context bundle shared by all tasks of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// The user request the plan was derived from.
    pub request: String,
}

impl ExecutionContext {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
        }
    }
}

/// Result of a direct dependency, as seen by its dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMessage {
    pub task: TaskId,
    pub content: String,
}

impl InputMessage {
    /// Labelled block used when concatenating dependency results.
    pub fn to_block(&self) -> String {
        format!("=== result of {} ===\n{}\n", self.task, self.content.trim_end())
    }
}

/// Streams partial output of a running task to the display.
#[derive(Clone)]
pub struct ResultSink {
    task: TaskId,
    progress: Arc<dyn ProgressSink>,
}

impl ResultSink {
    pub(crate) fn new(task: TaskId, progress: Arc<dyn ProgressSink>) -> Self {
        Self { task, progress }
    }

    pub fn emit(&self, chunk: &str) {
        self.progress.task_output(&self.task, chunk);
    }
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSink").field("task", &self.task).finish_non_exhaustive()
    }
}

/// Everything a task implementation receives.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub descriptor: Arc<TaskDescriptor>,
    /// Results of the direct dependencies, in id order.
    pub messages: Vec<InputMessage>,
    pub request: Arc<str>,
    /// The whole validated plan, serialized in the oracle's format.
    pub plan_json: Arc<str>,
    /// All transitive dependencies; for display, not fed into `messages`.
    pub transitive_dependencies: BTreeSet<TaskId>,
    coordinator: CoordinatorHandle,
    sink: ResultSink,
}

impl TaskContext {
    pub(crate) fn new(
        descriptor: Arc<TaskDescriptor>,
        messages: Vec<InputMessage>,
        request: Arc<str>,
        plan_json: Arc<str>,
        transitive_dependencies: BTreeSet<TaskId>,
        coordinator: CoordinatorHandle,
        sink: ResultSink,
    ) -> Self {
        Self {
            descriptor,
            messages,
            request,
            plan_json,
            transitive_dependencies,
            coordinator,
            sink,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Concatenated labelled results of the direct dependencies.
    pub fn dependency_input(&self) -> String {
        self.messages.iter().map(InputMessage::to_block).collect::<Vec<_>>().join("\n")
    }

    /// Handle for running nested plans from inside this task.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }
}
