#![allow(dead_code)]

use plandag::config::{ConfigFile, RawConfigFile};
use plandag::plan::{RawPlan, RawTask};

/// Builder for `RawPlan` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlan,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self { plan: RawPlan::new() }
    }

    /// Add a task with the given type and dependencies; the description is
    /// the task id.
    pub fn task(self, id: &str, task_type: &str, deps: &[&str]) -> Self {
        self.task_with_description(id, task_type, id, deps)
    }

    pub fn task_with_description(
        mut self,
        id: &str,
        task_type: &str,
        description: &str,
        deps: &[&str],
    ) -> Self {
        let mut task = RawTask::new(task_type, description);
        for dep in deps {
            task = task.with_dependency(*dep);
        }
        self.plan.insert(id, task);
        self
    }

    pub fn build(self) -> RawPlan {
        self.plan
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.executor.pool_size = size;
        self
    }

    pub fn completion_timeout(mut self, timeout: &str) -> Self {
        self.config.executor.completion_timeout = timeout.to_string();
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.config.executor.max_nesting_depth = depth;
        self
    }

    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.config.validation.retry_budget = budget;
        self
    }

    pub fn require_dependencies(mut self, tag: &str) -> Self {
        self.config.validation.require_dependencies.push(tag.to_string());
        self
    }

    pub fn dependency_only(mut self, tag: &str) -> Self {
        self.config.validation.dependency_only.push(tag.to_string());
        self
    }

    pub fn auto_fix(mut self, val: bool) -> Self {
        self.config.retry.auto_fix = val;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
