// src/autofix.rs

//! Run-and-validate cycle for plans, wrapped in the retry loop.
//!
//! An attempt runs the plan on the coordinator; it succeeds when every task
//! completed without failure. Failures become [`Problem`]s, and the next
//! attempt's request text carries the deduplicated history so the tasks (or
//! the oracle behind them) can focus on what went wrong.

use tracing::info;

use crate::exec::{Coordinator, ExecutionContext, FailureKind, ProcessingState};
use crate::plan::RawPlan;
use crate::retry::{Attempt, Outcome, Problem, RetryOrchestrator, RetryReport};

pub const SEVERITY_TASK_FAILED: u32 = 5;
pub const SEVERITY_TIMED_OUT: u32 = 6;
pub const SEVERITY_CANCELLED: u32 = 7;
pub const SEVERITY_UNKNOWN_TASK_TYPE: u32 = 8;
pub const SEVERITY_PLAN_REJECTED: u32 = 10;

/// Run `plan` until it completes cleanly or the orchestrator stops retrying.
///
/// The report's value is `None` when the plan could not be executed at all
/// (e.g. a cycle that survived the validation budget). A shut down session
/// turns retries off, so a cancelled run stops with its partial state.
pub async fn run_with_auto_fix(
    coordinator: &Coordinator,
    plan: &RawPlan,
    request: &str,
    orchestrator: &mut RetryOrchestrator,
) -> RetryReport<Option<ProcessingState>> {
    let control = orchestrator.control();
    orchestrator
        .run(|attempt: Attempt| {
            let coordinator = coordinator.clone();
            let control = control.clone();
            let plan = plan.clone();
            let request = request_with_history(request, &attempt.history);
            async move {
                info!(attempt = attempt.number, "running plan");
                let result = coordinator.execute(plan, ExecutionContext::new(request)).await;
                if coordinator.pool().is_shut_down() {
                    control.disable();
                }
                match result {
                    Ok(state) => {
                        let problems = problems_from_state(&state);
                        if problems.is_empty() {
                            Outcome::success(Some(state))
                        } else {
                            Outcome::failure(Some(state), problems)
                        }
                    }
                    Err(e) => Outcome::failure(
                        None,
                        vec![Problem::new(e.to_string(), SEVERITY_PLAN_REJECTED).with_source("plan")],
                    ),
                }
            }
        })
        .await
}

/// Problems found in a finished (or timed out) execution.
pub fn problems_from_state(state: &ProcessingState) -> Vec<Problem> {
    let mut problems: Vec<Problem> = state
        .failures
        .iter()
        .map(|(task, failure)| {
            let severity = match failure.kind {
                FailureKind::UnknownTaskType => SEVERITY_UNKNOWN_TASK_TYPE,
                FailureKind::Error | FailureKind::Panicked => SEVERITY_TASK_FAILED,
            };
            Problem::new(failure.message.clone(), severity).with_source(task.clone())
        })
        .collect();

    if state.timed_out {
        let outstanding = state.outstanding();
        problems.push(
            Problem::new(
                format!("plan did not finish in time; outstanding: {}", outstanding.join(", ")),
                SEVERITY_TIMED_OUT,
            )
            .with_source("plan"),
        );
    } else if !state.is_complete() {
        let outstanding = state.outstanding();
        problems.push(
            Problem::new(
                format!("plan execution was cancelled; outstanding: {}", outstanding.join(", ")),
                SEVERITY_CANCELLED,
            )
            .with_source("plan"),
        );
    }

    problems
}

/// Append earlier problems to the request, most severe first.
pub fn request_with_history(request: &str, history: &[Problem]) -> String {
    if history.is_empty() {
        return request.to_string();
    }

    let mut text = String::from(request);
    text.push_str("\n\nPrevious attempts reported these problems (most severe first):\n");
    for problem in history {
        match &problem.source {
            Some(source) => text.push_str(&format!("- [{}] {}: {}\n", problem.severity, source, problem.message)),
            None => text.push_str(&format!("- [{}] {}\n", problem.severity, problem.message)),
        }
    }
    text
}
