// src/exec/coordinator.rs

//! Execution coordinator: runs a validated plan on the session worker pool.
//!
//! Every task becomes one spawned unit of work. A unit first awaits the
//! completion futures of its direct dependencies, then takes a pool slot,
//! runs the registered implementation and records the result. Waiting on
//! dependencies never holds a slot, so a long chain cannot starve the pool.
//!
//! Failure policy: an implementation error (or panic) is logged, reported to
//! the progress sink, and recorded; the task is still marked completed so
//! its dependents run with whatever input is available.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::anyhow;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::dag::{validate_with_oracle, DagGraph, PlanOracle, ReplayOracle, ValidatedPlan, ValidationOptions};
use crate::errors::{PlanError, Result};
use crate::exec::context::{ExecutionContext, InputMessage, ResultSink, TaskContext};
use crate::exec::pool::WorkerPool;
use crate::exec::progress::{ProgressSink, TracingProgress};
use crate::exec::registry::TaskRegistry;
use crate::exec::state::{FailureKind, ProcessingState, TaskFailure};
use crate::plan::{PlanGraph, RawPlan};
use crate::types::{TaskId, TaskState};

/// Resolves when a task's unit of work has returned.
pub type CompletionFuture = Shared<BoxFuture<'static, ()>>;

const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MAX_NESTING_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Soft ceiling for the completion barrier.
    pub completion_timeout: Duration,
    /// How many nested plan levels may be started from inside tasks.
    pub max_nesting_depth: usize,
    pub validation: ValidationOptions,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            validation: ValidationOptions::default(),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            completion_timeout: cfg.executor.completion_timeout()?,
            max_nesting_depth: cfg.executor.max_nesting_depth,
            validation: ValidationOptions::from_config(&cfg.validation),
        })
    }
}

/// Schedules and runs plans.
///
/// Cloning yields another handle to the same pool, registry and sink.
#[derive(Clone)]
pub struct Coordinator {
    pool: WorkerPool,
    registry: Arc<TaskRegistry>,
    progress: Arc<dyn ProgressSink>,
    options: Arc<CoordinatorOptions>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(pool: WorkerPool, registry: Arc<TaskRegistry>, options: CoordinatorOptions) -> Self {
        Self {
            pool,
            registry,
            progress: Arc::new(TracingProgress),
            options: Arc::new(options),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Validate and order a plan with this coordinator's rules.
    pub fn validate(&self, plan: RawPlan) -> Result<ValidatedPlan> {
        validate_with_oracle(plan, &self.options.validation, &mut ReplayOracle)
    }

    /// Validate `plan` and run it to completion (or until the barrier times
    /// out).
    pub async fn execute(&self, plan: RawPlan, context: ExecutionContext) -> Result<ProcessingState> {
        let validated = self.validate(plan)?;
        self.execute_validated(validated, context).await
    }

    /// Like [`execute`](Self::execute), regenerating rejected plans through
    /// `oracle`.
    pub async fn execute_with_oracle(
        &self,
        plan: RawPlan,
        context: ExecutionContext,
        oracle: &mut dyn PlanOracle,
    ) -> Result<ProcessingState> {
        let validated = validate_with_oracle(plan, &self.options.validation, oracle)?;
        self.execute_validated(validated, context).await
    }

    pub async fn execute_validated(
        &self,
        plan: ValidatedPlan,
        context: ExecutionContext,
    ) -> Result<ProcessingState> {
        if self.pool.is_shut_down() {
            return Err(PlanError::PoolClosed);
        }

        info!(
            tasks = plan.order.len(),
            depth = self.pool.depth(),
            pool_size = self.pool.size(),
            "executing plan"
        );

        let plan_json: Arc<str> = plan.graph.to_json()?.into();
        let state = ProcessingState::new(plan.graph.clone(), plan.order.clone());
        for id in plan.order.iter() {
            self.progress.state_changed(id, TaskState::Pending);
        }

        let env = Arc::new(RunEnv {
            coordinator: self.clone(),
            dag: DagGraph::from_plan(&plan.graph),
            graph: plan.graph,
            request: context.request.into(),
            plan_json,
            state: Mutex::new(state),
        });

        // Submission follows the topological order, so every dependency's
        // completion future exists by the time its dependents are spawned.
        let mut futures: BTreeMap<TaskId, CompletionFuture> = BTreeMap::new();
        for id in plan.order.iter() {
            let deps: Vec<CompletionFuture> = env
                .dag
                .dependencies_of(id)
                .iter()
                .filter_map(|dep| futures.get(dep).cloned())
                .collect();

            let handle = tokio::spawn(run_unit(Arc::clone(&env), id.clone(), deps));
            let task_id = id.clone();
            let completion = async move {
                if let Err(e) = handle.await {
                    error!(task = %task_id, error = %e, "worker unit ended abnormally");
                }
            }
            .boxed()
            .shared();
            futures.insert(id.clone(), completion);
        }

        let barrier = join_all(futures.values().cloned());
        let timed_out = timeout(self.options.completion_timeout, barrier).await.is_err();

        let mut snapshot = env.lock().clone();
        snapshot.timed_out = timed_out;

        if timed_out {
            warn!(
                timeout = ?self.options.completion_timeout,
                outstanding = ?snapshot.outstanding(),
                "completion barrier timed out; returning partial state"
            );
        }
        info!(
            completed = snapshot.completed.len(),
            failed = snapshot.failures.len(),
            total = snapshot.sub_tasks.len(),
            "plan execution finished"
        );

        Ok(snapshot)
    }

    /// Coordinator for plans started from tasks running on this one.
    fn nested(&self) -> Result<Coordinator> {
        let depth = self.pool.depth() + 1;
        if depth > self.options.max_nesting_depth {
            return Err(PlanError::NestingTooDeep {
                depth,
                limit: self.options.max_nesting_depth,
            });
        }

        Ok(Coordinator {
            pool: self.pool.nested(),
            ..self.clone()
        })
    }
}

/// Handle given to task implementations for re-entering the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    coordinator: Coordinator,
}

impl CoordinatorHandle {
    /// Nesting depth of the task holding this handle.
    pub fn depth(&self) -> usize {
        self.coordinator.pool.depth()
    }

    /// Run a nested plan to completion on the next pool level.
    pub async fn run_nested(&self, plan: RawPlan, request: &str) -> Result<ProcessingState> {
        let child = self.coordinator.nested()?;
        debug!(depth = child.pool.depth(), tasks = plan.len(), "starting nested plan");
        child.execute(plan, ExecutionContext::new(request)).await
    }
}

/// Shared, read-mostly environment of one execution.
struct RunEnv {
    coordinator: Coordinator,
    graph: PlanGraph,
    dag: DagGraph,
    request: Arc<str>,
    plan_json: Arc<str>,
    state: Mutex<ProcessingState>,
}

impl RunEnv {
    fn lock(&self) -> MutexGuard<'_, ProcessingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn direct_inputs(&self, id: &str) -> Vec<InputMessage> {
        let state = self.lock();
        self.dag
            .dependencies_of(id)
            .iter()
            .map(|dep| InputMessage {
                task: dep.clone(),
                content: state.results.get(dep).cloned().unwrap_or_default(),
            })
            .collect()
    }

    fn start(&self, id: &str) {
        self.lock().mark_started(id);
        self.coordinator.progress.state_changed(id, TaskState::InProgress);
    }

    fn finish(&self, id: &str, outcome: std::result::Result<String, TaskFailure>) {
        let (result, failure) = match outcome {
            Ok(result) => (result, None),
            Err(failure) => {
                error!(
                    task = %id,
                    kind = ?failure.kind,
                    error = %failure.message,
                    "task failed; marking completed so dependents can proceed"
                );
                self.coordinator.progress.task_failed(id, &failure.message);
                (String::new(), Some(failure))
            }
        };

        self.lock().mark_completed(id, result, failure);
        self.coordinator.progress.state_changed(id, TaskState::Completed);
    }
}

async fn run_unit(env: Arc<RunEnv>, id: TaskId, deps: Vec<CompletionFuture>) {
    let shutdown = env.coordinator.pool.shutdown_requested();

    // Shutdown wins over a unit that became ready in the same poll.
    tokio::select! {
        biased;
        _ = shutdown => {
            warn!(task = %id, "session shut down; abandoning task");
        }
        _ = drive_task(&env, &id, deps) => {}
    }
}

async fn drive_task(env: &RunEnv, id: &str, deps: Vec<CompletionFuture>) {
    join_all(deps).await;

    let _permit = match env.coordinator.pool.acquire().await {
        Ok(permit) => permit,
        Err(_) if env.coordinator.pool.is_shut_down() => {
            debug!(task = %id, "session shut down before the task got a slot");
            return;
        }
        Err(e) => {
            env.finish(id, Err(TaskFailure::new(FailureKind::Error, e.to_string())));
            return;
        }
    };

    env.start(id);
    let outcome = match AssertUnwindSafe(invoke(env, id)).catch_unwind().await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TaskFailure::from_error(&e)),
        Err(panic) => Err(TaskFailure::new(
            FailureKind::Panicked,
            format!("task panicked: {}", panic_message(panic.as_ref())),
        )),
    };
    env.finish(id, outcome);
}

async fn invoke(env: &RunEnv, id: &str) -> anyhow::Result<String> {
    let descriptor = env
        .graph
        .get(id)
        .cloned()
        .ok_or_else(|| anyhow!("task '{id}' is not part of the plan"))?;
    let task = env.coordinator.registry.instantiate(&descriptor)?;

    let ctx = TaskContext::new(
        descriptor,
        env.direct_inputs(id),
        Arc::clone(&env.request),
        Arc::clone(&env.plan_json),
        env.dag.transitive_dependencies_of(id),
        CoordinatorHandle {
            coordinator: env.coordinator.clone(),
        },
        ResultSink::new(id.to_string(), Arc::clone(&env.coordinator.progress)),
    );

    debug!(task = %id, inputs = ctx.messages.len(), "invoking task implementation");
    task.run(ctx).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
