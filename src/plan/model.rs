// src/plan/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::TaskId;

/// One task entry as emitted by the planning oracle.
///
/// ```json
/// {
///   "build": {
///     "task_type": "shell",
///     "task_description": "cargo build",
///     "task_dependencies": ["fetch"]
///   }
/// }
/// ```
///
/// The `state` field belongs to the engine; whatever the oracle writes there
/// is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTask {
    pub task_type: String,

    #[serde(default)]
    pub task_description: String,

    /// May be empty, and may reference ids that do not exist (yet).
    #[serde(default)]
    pub task_dependencies: Vec<TaskId>,

    #[serde(default, skip_serializing)]
    pub state: Option<serde_json::Value>,
}

impl RawTask {
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            task_description: description.into(),
            task_dependencies: Vec::new(),
            state: None,
        }
    }

    pub fn with_dependency(mut self, dep: impl Into<TaskId>) -> Self {
        self.task_dependencies.push(dep.into());
        self
    }
}

/// Unvalidated plan: task id -> raw task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPlan {
    pub tasks: BTreeMap<TaskId, RawTask>,
}

impl RawPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<TaskId>, task: RawTask) {
        self.tasks.insert(id.into(), task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Immutable description of one node in the plan graph.
///
/// Per-run state is deliberately absent; it lives in the coordinator's
/// state table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub task_type: String,
    pub description: String,
    pub dependencies: BTreeSet<TaskId>,
}

/// Mapping id -> descriptor.
///
/// Only the validator produces graphs that satisfy the "no dangling edges,
/// acyclic" invariant; `from_raw` just copies the raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanGraph {
    tasks: BTreeMap<TaskId, Arc<TaskDescriptor>>,
}

impl PlanGraph {
    pub fn from_raw(raw: &RawPlan) -> Self {
        let tasks = raw
            .tasks
            .iter()
            .map(|(id, task)| {
                let descriptor = TaskDescriptor {
                    id: id.clone(),
                    task_type: task.task_type.clone(),
                    description: task.task_description.clone(),
                    dependencies: task.task_dependencies.iter().cloned().collect(),
                };
                (id.clone(), Arc::new(descriptor))
            })
            .collect();
        Self { tasks }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<TaskDescriptor>> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDescriptor>> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<TaskDescriptor>> {
        self.tasks.remove(id)
    }

    /// Replace the dependency set of `id`, returning `true` if it changed.
    pub(crate) fn set_dependencies(&mut self, id: &str, deps: BTreeSet<TaskId>) -> bool {
        match self.tasks.get_mut(id) {
            Some(descriptor) if descriptor.dependencies != deps => {
                Arc::make_mut(descriptor).dependencies = deps;
                true
            }
            _ => false,
        }
    }

    /// Convert back into the oracle's wire format.
    pub fn to_raw(&self) -> RawPlan {
        let tasks = self
            .tasks
            .values()
            .map(|d| {
                let task = RawTask {
                    task_type: d.task_type.clone(),
                    task_description: d.description.clone(),
                    task_dependencies: d.dependencies.iter().cloned().collect(),
                    state: None,
                };
                (d.id.clone(), task)
            })
            .collect();
        RawPlan { tasks }
    }

    /// Whole-plan JSON handed to every task as context.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_raw())?)
    }
}
