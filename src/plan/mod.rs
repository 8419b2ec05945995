// src/plan/mod.rs

//! Plan model: the raw task map produced by a planning oracle and the
//! immutable descriptor graph derived from it.
//!
//! - [`model`] holds `RawPlan` (wire format) and `PlanGraph` (validated form).
//! - [`loader`] reads plans from JSON text or files.

pub mod loader;
pub mod model;

pub use loader::{load_plan_from_path, parse_plan};
pub use model::{PlanGraph, RawPlan, RawTask, TaskDescriptor};
