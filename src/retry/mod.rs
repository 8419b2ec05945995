// src/retry/mod.rs

//! Bounded, user-interruptible retry loop around a run-and-validate unit.
//!
//! - [`record`] keeps the deduplicated, severity-ranked failure history.
//! - [`orchestrator`] drives the attempts.

pub mod orchestrator;
pub mod record;

pub use orchestrator::{Attempt, Outcome, RetryControl, RetryOptions, RetryOrchestrator, RetryReport, StopReason};
pub use record::{ErrorRecord, Problem};
