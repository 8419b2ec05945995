// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PlanError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlanError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.validation, raw.retry))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(cfg)?;
    validate_task_type_lists(cfg)?;
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.pool_size == 0 {
        return Err(PlanError::ConfigError(
            "[executor].pool_size must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = cfg.executor.completion_timeout()?;
    if timeout == Duration::ZERO {
        return Err(PlanError::ConfigError(
            "[executor].completion_timeout must be greater than zero".to_string(),
        ));
    }

    if cfg.executor.max_nesting_depth == 0 {
        return Err(PlanError::ConfigError(
            "[executor].max_nesting_depth must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_type_lists(cfg: &RawConfigFile) -> Result<()> {
    let lists = [
        ("require_dependencies", &cfg.validation.require_dependencies),
        ("dependency_only", &cfg.validation.dependency_only),
    ];

    for (field, tags) in lists {
        if let Some(pos) = tags.iter().position(|t| t.trim().is_empty()) {
            return Err(PlanError::ConfigError(format!(
                "[validation].{field}[{pos}] must be a non-empty task type"
            )));
        }
    }

    Ok(())
}
