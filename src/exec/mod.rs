// src/exec/mod.rs

//! Plan execution layer.
//!
//! - [`pool`] provides the bounded, session-wide [`WorkerPool`].
//! - [`coordinator`] submits tasks in dependency-safe order and owns the
//!   per-execution [`ProcessingState`].
//! - [`state`] defines that state.
//! - [`context`] holds what a task implementation receives.
//! - [`registry`] maps task types to implementations.
//! - [`builtin`] contains the built-in `echo`, `shell` and `subplan` types.
//! - [`progress`] is the display side channel.

pub mod builtin;
pub mod context;
pub mod coordinator;
pub mod pool;
pub mod progress;
pub mod registry;
pub mod state;

pub use context::{ExecutionContext, InputMessage, ResultSink, TaskContext};
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorOptions};
pub use pool::WorkerPool;
pub use progress::{ProgressSink, TracingProgress};
pub use registry::{TaskFuture, TaskImpl, TaskRegistry, TaskSchema};
pub use state::{FailureKind, ProcessingState, TaskFailure, TaskTiming};
