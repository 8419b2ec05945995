// src/plan/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{PlanError, Result};
use crate::plan::model::RawPlan;

/// Parse a plan from oracle output.
///
/// Oracles frequently wrap JSON in a fenced code block (```` ```json ````);
/// the fence is stripped before parsing.
pub fn parse_plan(text: &str) -> Result<RawPlan> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(PlanError::InvalidPlan("plan text is empty".to_string()));
    }

    let plan: RawPlan = serde_json::from_str(body)?;
    debug!(tasks = plan.len(), "parsed plan");
    Ok(plan)
}

/// Load a plan JSON file from disk.
pub fn load_plan_from_path(path: impl AsRef<Path>) -> Result<RawPlan> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_plan(&contents)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string (e.g. "json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return "",
    };

    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
