// tests/coordinator.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    init_tracing, with_timeout, FailingTask, PanickingTask, PlanBuilder, RecordingProgress,
    RecordingTask,
};
use plandag::errors::PlanError;
use plandag::exec::{
    Coordinator, CoordinatorOptions, ExecutionContext, FailureKind, TaskRegistry, TaskSchema,
    WorkerPool,
};
use plandag::plan::{RawPlan, RawTask};
use plandag::types::TaskState;

fn registry_with(work: &RecordingTask) -> TaskRegistry {
    let mut registry = TaskRegistry::with_builtins();
    registry.register_shared("work", TaskSchema::new("recorded sleep"), Arc::new(work.clone()));
    registry.register_shared("fail", TaskSchema::new("always fails"), Arc::new(FailingTask));
    registry.register_shared("boom", TaskSchema::new("always panics"), Arc::new(PanickingTask));
    registry
}

fn coordinator(pool_size: usize, registry: TaskRegistry, options: CoordinatorOptions) -> Coordinator {
    Coordinator::new(WorkerPool::new(pool_size), Arc::new(registry), options)
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new("test request")
}

#[tokio::test]
async fn independent_tasks_overlap_and_dependents_wait() {
    init_tracing();
    let work = RecordingTask::new(Duration::from_millis(150));
    let coord = coordinator(2, registry_with(&work), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("A", "work", &[])
        .task("B", "work", &[])
        .task("C", "work", &["A", "B"])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert!(state.is_complete());
    assert!(!state.has_failures());
    let rec = work.recorded();
    let (a, b, c) = (rec.spans["A"], rec.spans["B"], rec.spans["C"]);
    assert!(a.overlaps(&b), "A and B should run concurrently");
    assert!(c.started >= a.finished && c.started >= b.finished);
    assert_eq!(rec.inputs["C"], vec!["A".to_string(), "B".to_string()]);
    assert_eq!(state.result_of("C"), Some("C done"));
}

#[tokio::test]
async fn pool_bounds_concurrency() {
    init_tracing();
    let work = RecordingTask::new(Duration::from_millis(50));
    let coord = coordinator(2, registry_with(&work), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("t1", "work", &[])
        .task("t2", "work", &[])
        .task("t3", "work", &[])
        .task("t4", "work", &[])
        .task("t5", "work", &[])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert_eq!(state.completed.len(), 5);
    assert!(work.recorded().max_concurrent <= 2);
    assert_eq!(coord.pool().available(), 2);
}

#[tokio::test]
async fn failed_task_is_completed_and_dependents_still_run() {
    init_tracing();
    let work = RecordingTask::new(Duration::from_millis(1));
    let progress = RecordingProgress::new();
    let coord = coordinator(2, registry_with(&work), CoordinatorOptions::default())
        .with_progress(progress.clone());
    let plan = PlanBuilder::new()
        .task("bad", "fail", &[])
        .task("after", "work", &["bad"])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert!(state.is_complete());
    assert_eq!(state.state_of("bad"), Some(TaskState::Completed));
    assert_eq!(state.result_of("bad"), Some(""));
    assert_eq!(state.failures["bad"].kind, FailureKind::Error);
    assert!(state.failures["bad"].message.contains("failed on purpose"));
    assert_eq!(state.result_of("after"), Some("after done"));
    assert_eq!(work.recorded().inputs["after"], vec!["bad".to_string()]);

    assert_eq!(
        progress.states_of("bad"),
        vec![TaskState::Pending, TaskState::InProgress, TaskState::Completed]
    );
    assert_eq!(progress.failures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn only_direct_dependency_results_are_passed() {
    init_tracing();
    let work = RecordingTask::new(Duration::from_millis(1));
    let coord = coordinator(2, registry_with(&work), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("A", "work", &[])
        .task("B", "work", &["A"])
        .task("C", "work", &["B"])
        .build();

    with_timeout(coord.execute(plan, ctx())).await.unwrap();

    let rec = work.recorded();
    assert!(rec.inputs["A"].is_empty());
    assert_eq!(rec.inputs["B"], vec!["A".to_string()]);
    assert_eq!(rec.inputs["C"], vec!["B".to_string()]);
    assert!(rec.requests.iter().all(|r| r == "test request"));
}

#[tokio::test]
async fn echo_labels_dependency_results() {
    init_tracing();
    let coord = coordinator(2, TaskRegistry::with_builtins(), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task_with_description("A", "echo", "alpha", &[])
        .task_with_description("B", "echo", "beta", &["A"])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert_eq!(state.result_of("A"), Some("alpha"));
    assert_eq!(state.result_of("B"), Some("beta\n=== result of A ===\nalpha\n"));
}

#[tokio::test]
async fn timeout_returns_partial_state() {
    init_tracing();
    let slow = RecordingTask::new(Duration::from_secs(3));
    let options = CoordinatorOptions {
        completion_timeout: Duration::from_millis(200),
        ..CoordinatorOptions::default()
    };
    let coord = coordinator(2, registry_with(&slow), options);
    let plan = PlanBuilder::new()
        .task_with_description("quick", "echo", "fast", &[])
        .task("slow", "work", &[])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert!(state.timed_out);
    assert_eq!(state.result_of("quick"), Some("fast"));
    assert_eq!(state.outstanding(), vec!["slow".to_string()]);
    assert_eq!(state.state_of("slow"), Some(TaskState::InProgress));
}

fn nested_plan_json(plan: &RawPlan) -> String {
    serde_json::to_string(plan).unwrap()
}

#[tokio::test]
async fn nested_plan_runs_on_single_slot_pool() {
    init_tracing();
    let inner = PlanBuilder::new()
        .task_with_description("x", "echo", "inner x", &[])
        .task_with_description("y", "echo", "inner y", &["x"])
        .build();
    let mut outer = RawPlan::new();
    outer.insert("outer", RawTask::new("subplan", nested_plan_json(&inner)));
    outer.insert("tail", RawTask::new("echo", "tail").with_dependency("outer"));

    let coord = coordinator(1, TaskRegistry::with_builtins(), CoordinatorOptions::default());
    let state = with_timeout(coord.execute(outer, ctx())).await.unwrap();

    assert!(!state.has_failures(), "failures: {:?}", state.failures);
    let result = state.result_of("outer").unwrap();
    assert!(result.contains("=== result of x ===\ninner x"));
    assert!(result.contains("=== result of y ==="));
    assert!(state.result_of("tail").unwrap().contains("=== result of outer ==="));
}

#[tokio::test]
async fn nesting_beyond_the_limit_fails_the_task() {
    init_tracing();
    let innermost = PlanBuilder::new().task("leaf", "echo", &[]).build();
    let middle = {
        let mut plan = RawPlan::new();
        plan.insert("middle", RawTask::new("subplan", nested_plan_json(&innermost)));
        plan
    };
    let mut outer = RawPlan::new();
    outer.insert("outer", RawTask::new("subplan", nested_plan_json(&middle)));

    let options = CoordinatorOptions {
        max_nesting_depth: 1,
        ..CoordinatorOptions::default()
    };
    let coord = coordinator(1, TaskRegistry::with_builtins(), options);
    let state = with_timeout(coord.execute(outer, ctx())).await.unwrap();

    assert!(state.is_complete());
    assert!(state.failures["outer"].message.contains("middle"), "got {:?}", state.failures);
}

#[tokio::test]
async fn unknown_task_type_is_reported_as_failure() {
    init_tracing();
    let coord = coordinator(1, TaskRegistry::with_builtins(), CoordinatorOptions::default());
    let plan = PlanBuilder::new().task("x", "mystery", &[]).build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert_eq!(state.state_of("x"), Some(TaskState::Completed));
    assert_eq!(state.failures["x"].kind, FailureKind::UnknownTaskType);
    assert!(state.failures["x"].message.contains("mystery"));
}

#[tokio::test]
async fn panic_is_caught() {
    init_tracing();
    let work = RecordingTask::new(Duration::from_millis(1));
    let coord = coordinator(1, registry_with(&work), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("boom", "boom", &[])
        .task("after", "work", &["boom"])
        .build();

    let state = with_timeout(coord.execute(plan, ctx())).await.unwrap();

    assert!(state.is_complete());
    assert_eq!(state.failures["boom"].kind, FailureKind::Panicked);
    assert!(state.failures["boom"].message.contains("panicked on purpose"));
    assert_eq!(state.result_of("after"), Some("after done"));
    assert_eq!(coord.pool().available(), 1);
}

#[tokio::test]
async fn shutdown_abandons_running_work() {
    init_tracing();
    let slow = RecordingTask::new(Duration::from_secs(30));
    let coord = coordinator(1, registry_with(&slow), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("slow", "work", &[])
        .task("next", "work", &["slow"])
        .build();

    let pool = coord.pool().clone();
    let running = {
        let coord = coord.clone();
        tokio::spawn(async move { coord.execute(plan, ctx()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    pool.shutdown();

    let state = with_timeout(running).await.unwrap().unwrap();
    assert!(!state.is_complete());
    assert!(state.completed.is_empty());

    let again = coord.execute(PlanBuilder::new().task("z", "echo", &[]).build(), ctx()).await;
    assert!(matches!(again, Err(PlanError::PoolClosed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_never_records_results_for_abandoned_dependents() {
    init_tracing();
    for round in 0..40 {
        let slow = RecordingTask::new(Duration::from_secs(30));
        let coord = coordinator(2, registry_with(&slow), CoordinatorOptions::default());
        let plan = PlanBuilder::new()
            .task("slow", "work", &[])
            .task("next", "work", &["slow"])
            .build();

        let pool = coord.pool().clone();
        let running = tokio::spawn(async move { coord.execute(plan, ctx()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown();

        let state = with_timeout(running).await.unwrap().unwrap();
        assert!(state.completed.is_empty(), "round {round}: completed {:?}", state.completed);
        assert!(state.failures.is_empty(), "round {round}: failures {:?}", state.failures);
        assert_ne!(state.state_of("next"), Some(TaskState::Completed));
    }
}

#[tokio::test]
async fn rejected_plan_is_an_error() {
    init_tracing();
    let coord = coordinator(1, TaskRegistry::with_builtins(), CoordinatorOptions::default());
    let plan = PlanBuilder::new()
        .task("A", "echo", &["B"])
        .task("B", "echo", &["A"])
        .build();

    let result = coord.execute(plan, ctx()).await;
    assert!(matches!(result, Err(PlanError::CircularDependency(_))));
}
