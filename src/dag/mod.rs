// src/dag/mod.rs

//! DAG representation, validation and ordering.
//!
//! - [`graph`] holds adjacency information (dependencies and dependents)
//!   derived from a [`PlanGraph`](crate::plan::PlanGraph).
//! - [`validate`] prunes dangling references, applies structural rules,
//!   detects cycles and computes the layered topological order.

pub mod graph;
pub mod validate;

pub use graph::DagGraph;
pub use validate::{
    execution_order, validate, validate_with_oracle, PlanOracle, RejectReason, ReplayOracle,
    ValidatedPlan, ValidationOptions,
};
