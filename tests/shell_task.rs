// tests/shell_task.rs
#![cfg(unix)]

mod common;

use std::sync::Arc;

use common::{init_tracing, with_timeout, PlanBuilder, RecordingProgress};
use plandag::exec::{Coordinator, CoordinatorOptions, ExecutionContext, TaskRegistry, WorkerPool};

fn coordinator(progress: Arc<RecordingProgress>) -> Coordinator {
    Coordinator::new(
        WorkerPool::new(2),
        Arc::new(TaskRegistry::with_builtins()),
        CoordinatorOptions::default(),
    )
    .with_progress(progress)
}

#[tokio::test]
async fn shell_stdout_becomes_the_result() {
    init_tracing();
    let progress = RecordingProgress::new();
    let coord = coordinator(progress.clone());
    let plan = PlanBuilder::new()
        .task_with_description("hello", "shell", "echo one; echo two", &[])
        .build();

    let state = with_timeout(coord.execute(plan, ExecutionContext::new(""))).await.unwrap();

    assert_eq!(state.result_of("hello"), Some("one\ntwo\n"));
    let output = progress.output.lock().unwrap().clone();
    assert_eq!(
        output,
        vec![("hello".to_string(), "one".to_string()), ("hello".to_string(), "two".to_string())]
    );
}

#[tokio::test]
async fn dependency_input_arrives_on_stdin() {
    init_tracing();
    let coord = coordinator(RecordingProgress::new());
    let plan = PlanBuilder::new()
        .task_with_description("src", "echo", "payload", &[])
        .task_with_description("count", "shell", "grep -c payload", &["src"])
        .task_with_description("id", "shell", "printf %s \"$PLANDAG_TASK_ID\"", &[])
        .build();

    let state = with_timeout(coord.execute(plan, ExecutionContext::new(""))).await.unwrap();

    assert!(!state.has_failures(), "failures: {:?}", state.failures);
    assert_eq!(state.result_of("count").map(str::trim), Some("1"));
    assert_eq!(state.result_of("id"), Some("id"));
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_with_stderr_tail() {
    init_tracing();
    let coord = coordinator(RecordingProgress::new());
    let plan = PlanBuilder::new()
        .task_with_description("bad", "shell", "echo oops >&2; exit 3", &[])
        .build();

    let state = with_timeout(coord.execute(plan, ExecutionContext::new(""))).await.unwrap();

    let error = &state.failures["bad"].message;
    assert!(error.contains("exited with code 3"), "error: {error}");
    assert!(error.contains("oops"));
}
