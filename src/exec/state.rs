// src/exec/state.rs

//! Per-execution state owned by the coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use tracing::warn;

use crate::errors::PlanError;
use crate::plan::PlanGraph;
use crate::render::DiagramCache;
use crate::types::{TaskId, TaskState};

/// Wall-clock window of one task body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub started: Instant,
    pub finished: Option<Instant>,
}

/// How a task body went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The implementation returned an error.
    Error,
    Panicked,
    /// No implementation is registered for the task's type.
    UnknownTaskType,
}

/// Recorded failure of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an implementation error; registry misses keep their kind.
    pub fn from_error(error: &anyhow::Error) -> Self {
        let kind = match error.downcast_ref::<PlanError>() {
            Some(PlanError::UnknownTaskType(_)) => FailureKind::UnknownTaskType,
            _ => FailureKind::Error,
        };
        Self::new(kind, format!("{error:#}"))
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything the coordinator knows about one plan execution.
///
/// Created fresh per execution. Workers mutate it behind a mutex; callers
/// receive a snapshot once the completion barrier returns.
#[derive(Debug, Clone)]
pub struct ProcessingState {
    /// The validated plan.
    pub sub_tasks: PlanGraph,
    /// Topological order used as the submission sequence.
    pub execution_queue: Vec<TaskId>,
    /// Textual output per task, written once.
    pub results: BTreeMap<TaskId, String>,
    /// Tasks that finished, successfully or not.
    pub completed: BTreeSet<TaskId>,
    pub states: BTreeMap<TaskId, TaskState>,
    /// Tasks whose implementation failed.
    pub failures: BTreeMap<TaskId, TaskFailure>,
    pub timings: BTreeMap<TaskId, TaskTiming>,
    /// The completion barrier gave up before every task finished.
    pub timed_out: bool,
}

impl ProcessingState {
    pub fn new(sub_tasks: PlanGraph, execution_queue: Vec<TaskId>) -> Self {
        let states = sub_tasks
            .ids()
            .map(|id| (id.to_string(), TaskState::Pending))
            .collect();
        Self {
            sub_tasks,
            execution_queue,
            results: BTreeMap::new(),
            completed: BTreeSet::new(),
            states,
            failures: BTreeMap::new(),
            timings: BTreeMap::new(),
            timed_out: false,
        }
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.states.get(task).copied()
    }

    pub fn result_of(&self, task: &str) -> Option<&str> {
        self.results.get(task).map(|s| s.as_str())
    }

    /// `true` once every task of the plan is completed.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.sub_tasks.len()
    }

    /// Tasks that had not completed when the snapshot was taken.
    pub fn outstanding(&self) -> Vec<TaskId> {
        self.execution_queue
            .iter()
            .filter(|id| !self.completed.contains(*id))
            .cloned()
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub(crate) fn mark_started(&mut self, task: &str) {
        self.states.insert(task.to_string(), TaskState::InProgress);
        self.timings.insert(
            task.to_string(),
            TaskTiming {
                started: Instant::now(),
                finished: None,
            },
        );
    }

    /// Record the outcome of a task and mark it completed.
    pub(crate) fn mark_completed(&mut self, task: &str, result: String, failure: Option<TaskFailure>) {
        if self.results.contains_key(task) {
            warn!(task = %task, "result already recorded; ignoring second write");
        } else {
            self.results.insert(task.to_string(), result);
        }
        if let Some(failure) = failure {
            self.failures.insert(task.to_string(), failure);
        }

        let now = Instant::now();
        self.timings
            .entry(task.to_string())
            .and_modify(|t| t.finished = Some(now))
            .or_insert(TaskTiming {
                started: now,
                finished: Some(now),
            });
        self.completed.insert(task.to_string());
        self.states.insert(task.to_string(), TaskState::Completed);
    }

    /// Diagram of the plan with the current states.
    pub fn render_diagram(&self, cache: &mut DiagramCache) -> String {
        cache.get_or_render(&self.sub_tasks, &self.states)
    }
}
