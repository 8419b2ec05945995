// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::errors::{PlanError, Result};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// pool_size = 4
/// completion_timeout = "10m"
/// max_nesting_depth = 4
///
/// [validation]
/// retry_budget = 2
/// require_dependencies = ["summarize"]
/// dependency_only = ["fetch_context"]
///
/// [retry]
/// auto_fix = true
/// max_attempts = 2
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub validation: ValidationSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (or `Default`), so the
/// invariants checked in `validate.rs` hold.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub validation: ValidationSection,
    pub retry: RetrySection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        validation: ValidationSection,
        retry: RetrySection,
    ) -> Self {
        Self {
            executor,
            validation,
            retry,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    /// Worker slots shared by every plan of the session.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Soft ceiling on waiting for a plan to finish, e.g. `"90s"`.
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout: String,

    /// Maximum depth of plans started from inside tasks.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

fn default_pool_size() -> usize {
    4
}

fn default_completion_timeout() -> String {
    "10m".to_string()
}

fn default_max_nesting_depth() -> usize {
    4
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            completion_timeout: default_completion_timeout(),
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

impl ExecutorSection {
    pub fn completion_timeout(&self) -> Result<Duration> {
        parse_duration(&self.completion_timeout).map_err(|e| {
            PlanError::ConfigError(format!("[executor].completion_timeout: {e}"))
        })
    }
}

/// `[validation]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    /// How many times a rejected plan may be regenerated.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Task types that must declare at least one dependency.
    #[serde(default)]
    pub require_dependencies: Vec<String>,

    /// Task types pruned when nothing depends on them.
    #[serde(default)]
    pub dependency_only: Vec<String>,
}

fn default_retry_budget() -> u32 {
    2
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
            require_dependencies: Vec::new(),
            dependency_only: Vec::new(),
        }
    }
}

/// `[retry]` section: the auto-fix loop around run-and-validate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// If false, a failed run is never retried.
    #[serde(default = "default_auto_fix")]
    pub auto_fix: bool,

    /// Retries after the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_auto_fix() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            auto_fix: default_auto_fix(),
            max_attempts: default_max_attempts(),
        }
    }
}
