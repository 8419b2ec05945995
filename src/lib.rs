// src/lib.rs

pub mod autofix;
pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod render;
pub mod retry;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::autofix::run_with_auto_fix;
use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::dag::{validate, DagGraph, ValidatedPlan, ValidationOptions};
use crate::exec::{Coordinator, CoordinatorOptions, ProcessingState, TaskRegistry, WorkerPool};
use crate::plan::load_plan_from_path;
use crate::render::DiagramCache;
use crate::retry::{RetryOptions, RetryOrchestrator, StopReason};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config and plan loading
/// - the task registry and validation rules
/// - the session worker pool and coordinator
/// - the auto-fix retry loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)
        .with_context(|| format!("loading config '{}'", args.config))?;
    let plan = load_plan_from_path(&args.plan)
        .with_context(|| format!("loading plan '{}'", args.plan))?;

    let registry = TaskRegistry::with_builtins();
    let validation = ValidationOptions::from_config(&cfg.validation).with_registry(&registry);

    if args.dry_run {
        let validated = validate(plan, &validation)?;
        print_dry_run(&cfg, &validated);
        return Ok(());
    }

    let mut options = CoordinatorOptions::from_config(&cfg)?;
    options.validation = validation;

    let pool = WorkerPool::new(cfg.executor.pool_size);
    let coordinator = Coordinator::new(pool.clone(), Arc::new(registry), options);

    // Ctrl-C → cancel the whole session.
    {
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            pool.shutdown();
        });
    }

    let mut retry_options = RetryOptions::from(&cfg.retry);
    if args.no_auto_fix {
        retry_options.auto_fix = false;
    }
    let mut orchestrator = RetryOrchestrator::new(retry_options);

    let report = run_with_auto_fix(&coordinator, &plan, &args.request, &mut orchestrator).await;
    info!(
        attempts = report.attempts,
        stop_reason = ?report.stop_reason,
        "finished"
    );

    let Some(state) = report.outcome.value else {
        let reason = report
            .history
            .first()
            .map(|p| p.message.clone())
            .unwrap_or_else(|| "plan could not be executed".to_string());
        anyhow::bail!(reason);
    };

    print_results(&state);
    if args.diagram {
        let mut cache = DiagramCache::new();
        println!("{}", state.render_diagram(&mut cache));
    }

    if report.stop_reason != StopReason::Succeeded {
        warn!(
            failed = ?state.failures.keys().collect::<Vec<_>>(),
            outstanding = ?state.outstanding(),
            "plan did not finish cleanly"
        );
        let reason = report
            .history
            .first()
            .map(|p| p.message.clone())
            .unwrap_or_else(|| "plan did not finish cleanly".to_string());
        anyhow::bail!(reason);
    }

    Ok(())
}

fn print_results(state: &ProcessingState) {
    for id in state.execution_queue.iter() {
        match (state.results.get(id), state.failures.get(id)) {
            (_, Some(error)) => println!("== {id} (failed) ==\n{error}\n"),
            (Some(result), None) => println!("== {id} ==\n{}\n", result.trim_end()),
            (None, None) => {
                let task_state = state.state_of(id).unwrap_or_default();
                println!("== {id} (not finished, {task_state}) ==\n");
            }
        }
    }
}

/// Print the validated order, layers and diagram without running anything.
fn print_dry_run(cfg: &ConfigFile, plan: &ValidatedPlan) {
    println!("plandag dry-run");
    println!("  executor.pool_size = {}", cfg.executor.pool_size);
    println!("  executor.completion_timeout = {}", cfg.executor.completion_timeout);
    println!("  validation.retry_budget = {}", cfg.validation.retry_budget);
    println!();

    let dag = DagGraph::from_plan(&plan.graph);
    println!("tasks ({}):", plan.order.len());
    for (n, layer) in plan.layers.iter().enumerate() {
        println!("  layer {}:", n + 1);
        for id in layer {
            let deps = dag.dependencies_of(id);
            if deps.is_empty() {
                println!("    - {id}");
            } else {
                println!("    - {id} (after {})", deps.join(", "));
            }
        }
    }
    if !plan.relaxed.is_empty() {
        println!("  kept without required dependencies: {}", plan.relaxed.join(", "));
    }
    println!();

    let mut cache = DiagramCache::new();
    println!("{}", cache.get_or_render(&plan.graph, &Default::default()));

    debug!("dry-run complete (no execution)");
}
