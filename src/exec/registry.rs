// src/exec/registry.rs

//! Task-type registry: a tag -> (schema, constructor) table.
//!
//! Dispatch is a single map lookup on `task_type`; there is no reflection or
//! type hierarchy. The constructor checks the task's payload against its
//! schema and returns a ready-to-run [`TaskImpl`].

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{PlanError, Result};
use crate::exec::builtin;
use crate::exec::context::TaskContext;
use crate::plan::TaskDescriptor;

/// Future returned by [`TaskImpl::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// Uniform execution contract for task implementations.
///
/// The returned text becomes the task's result. Errors and panics are caught
/// by the coordinator; they never abort the plan.
pub trait TaskImpl: Send + Sync {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_>;
}

/// Static facts about a task type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSchema {
    pub summary: String,
    /// Tasks of this type must declare at least one dependency.
    pub requires_dependencies: bool,
    /// Tasks of this type only exist to feed their dependents.
    pub dependency_only: bool,
}

impl TaskSchema {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn requires_dependencies(mut self) -> Self {
        self.requires_dependencies = true;
        self
    }

    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
        self
    }
}

/// Builds a task implementation from a descriptor.
pub type TaskConstructor =
    Arc<dyn Fn(&TaskDescriptor) -> anyhow::Result<Box<dyn TaskImpl>> + Send + Sync>;

#[derive(Clone)]
pub struct RegistryEntry {
    pub schema: TaskSchema,
    constructor: TaskConstructor,
}

/// Registered task types.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tags", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `echo`, `shell` and `subplan` types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) the implementation for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, schema: TaskSchema, constructor: F)
    where
        F: Fn(&TaskDescriptor) -> anyhow::Result<Box<dyn TaskImpl>> + Send + Sync + 'static,
    {
        self.entries.insert(
            tag.into(),
            RegistryEntry {
                schema,
                constructor: Arc::new(constructor),
            },
        );
    }

    /// Register a single shared implementation that ignores the payload.
    pub fn register_shared(&mut self, tag: impl Into<String>, schema: TaskSchema, task: Arc<dyn TaskImpl>) {
        self.register(tag, schema, move |_| Ok(Box::new(SharedTask(Arc::clone(&task))) as Box<dyn TaskImpl>));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn schema(&self, tag: &str) -> Option<&TaskSchema> {
        self.entries.get(tag).map(|e| &e.schema)
    }

    pub fn schemas(&self) -> impl Iterator<Item = (&str, &TaskSchema)> {
        self.entries.iter().map(|(tag, e)| (tag.as_str(), &e.schema))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Resolve the implementation for a descriptor.
    pub fn instantiate(&self, descriptor: &TaskDescriptor) -> Result<Box<dyn TaskImpl>> {
        let entry = self
            .entries
            .get(&descriptor.task_type)
            .ok_or_else(|| PlanError::UnknownTaskType(descriptor.task_type.clone()))?;
        let task = (entry.constructor)(descriptor)?;
        Ok(task)
    }
}

struct SharedTask(Arc<dyn TaskImpl>);

impl TaskImpl for SharedTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        self.0.run(ctx)
    }
}
