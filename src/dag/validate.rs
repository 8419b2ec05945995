// src/dag/validate.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use tracing::{debug, info, warn};

use crate::config::model::ValidationSection;
use crate::dag::graph::DagGraph;
use crate::errors::{PlanError, Result};
use crate::exec::registry::TaskRegistry;
use crate::plan::{PlanGraph, RawPlan};
use crate::types::TaskId;

/// Knobs for plan validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// How many times the oracle may be asked for a fresh plan.
    pub retry_budget: u32,
    /// Task types that must declare at least one dependency.
    pub require_dependencies: BTreeSet<String>,
    /// Task types that only exist to feed other tasks; pruned when nothing
    /// depends on them.
    pub dependency_only: BTreeSet<String>,
}

impl ValidationOptions {
    pub fn from_config(section: &ValidationSection) -> Self {
        Self {
            retry_budget: section.retry_budget,
            require_dependencies: section.require_dependencies.iter().cloned().collect(),
            dependency_only: section.dependency_only.iter().cloned().collect(),
        }
    }

    /// Merge structural rules declared by registered task schemas.
    pub fn with_registry(mut self, registry: &TaskRegistry) -> Self {
        for (tag, schema) in registry.schemas() {
            if schema.requires_dependencies {
                self.require_dependencies.insert(tag.to_string());
            }
            if schema.dependency_only {
                self.dependency_only.insert(tag.to_string());
            }
        }
        self
    }
}

/// Why a plan was sent back to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Tasks whose type requires dependencies but which declare none.
    MissingDependencies(Vec<TaskId>),
    /// Strongly connected groups of tasks (each group is one cycle).
    Cycle(Vec<Vec<TaskId>>),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingDependencies(ids) => {
                write!(f, "tasks must declare at least one dependency: {}", ids.join(", "))
            }
            RejectReason::Cycle(groups) => {
                let parts: Vec<String> = groups.iter().map(|g| format!("[{}]", g.join(" -> "))).collect();
                write!(f, "dependency cycle among tasks {}", parts.join(", "))
            }
        }
    }
}

/// Source of replacement plans when validation rejects one.
///
/// In production this is the planning oracle (e.g. a language model asked to
/// try again); the engine only consumes what it returns.
pub trait PlanOracle: Send {
    fn regenerate(&mut self, previous: &RawPlan, reason: &RejectReason) -> anyhow::Result<RawPlan>;
}

/// Oracle that re-derives the plan from the same input.
///
/// Used when no external oracle is wired in; a cyclic plan therefore fails
/// once the retry budget is spent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayOracle;

impl PlanOracle for ReplayOracle {
    fn regenerate(&mut self, previous: &RawPlan, _reason: &RejectReason) -> anyhow::Result<RawPlan> {
        Ok(previous.clone())
    }
}

/// A plan that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPlan {
    pub graph: PlanGraph,
    /// Topological order: each id appears after all of its dependencies.
    pub order: Vec<TaskId>,
    /// Kahn layers; `order` is their concatenation.
    pub layers: Vec<Vec<TaskId>>,
    /// Number of times the oracle was asked for a new plan.
    pub regenerations: u32,
    /// Tasks kept despite violating `require_dependencies`.
    pub relaxed: Vec<TaskId>,
}

/// Validate with [`ReplayOracle`].
pub fn validate(raw: RawPlan, options: &ValidationOptions) -> Result<ValidatedPlan> {
    validate_with_oracle(raw, options, &mut ReplayOracle)
}

/// Prune, filter, and order a raw plan, asking `oracle` for a new plan when a
/// violation is found and budget remains.
pub fn validate_with_oracle(
    raw: RawPlan,
    options: &ValidationOptions,
    oracle: &mut dyn PlanOracle,
) -> Result<ValidatedPlan> {
    let mut raw = raw;
    let mut budget = options.retry_budget;
    let mut regenerations = 0u32;

    loop {
        let mut graph = PlanGraph::from_raw(&raw);
        prune_to_fixed_point(&mut graph, options);

        let mut relaxed = Vec::new();
        let violations = missing_dependency_violations(&graph, options);
        if !violations.is_empty() {
            if budget > 0 {
                budget -= 1;
                regenerations += 1;
                let reason = RejectReason::MissingDependencies(violations);
                info!(%reason, remaining_budget = budget, "plan rejected; requesting a new plan");
                raw = oracle.regenerate(&raw, &reason)?;
                continue;
            }
            warn!(
                tasks = ?violations,
                "retry budget exhausted; keeping tasks without required dependencies"
            );
            relaxed = violations;
        }

        match kahn_layers(&graph) {
            Ok(layers) => {
                let order: Vec<TaskId> = layers.iter().flatten().cloned().collect();
                debug!(tasks = order.len(), layers = layers.len(), "plan validated");
                return Ok(ValidatedPlan {
                    graph,
                    order,
                    layers,
                    regenerations,
                    relaxed,
                });
            }
            Err(stuck) => {
                let reason = RejectReason::Cycle(cycle_groups(&graph, &stuck));
                if budget > 0 {
                    budget -= 1;
                    regenerations += 1;
                    info!(%reason, remaining_budget = budget, "cycle found; requesting a new plan");
                    raw = oracle.regenerate(&raw, &reason)?;
                    continue;
                }
                return Err(PlanError::CircularDependency(reason.to_string()));
            }
        }
    }
}

/// Topological order of an already pruned graph.
pub fn execution_order(graph: &PlanGraph) -> Result<Vec<TaskId>> {
    match kahn_layers(graph) {
        Ok(layers) => Ok(layers.into_iter().flatten().collect()),
        Err(stuck) => Err(PlanError::CircularDependency(
            RejectReason::Cycle(cycle_groups(graph, &stuck)).to_string(),
        )),
    }
}

/// Repeat the pruning rules until nothing changes.
///
/// Dropping a dependency-only task can dangle edges in the tasks that
/// depended on it, and dropping those edges can leave another dependency-only
/// task without dependents.
fn prune_to_fixed_point(graph: &mut PlanGraph, options: &ValidationOptions) {
    loop {
        let mut changed = prune_dangling(graph);
        changed |= prune_unused_dependency_only(graph, options);
        if !changed {
            break;
        }
    }
}

fn prune_dangling(graph: &mut PlanGraph) -> bool {
    let updates: Vec<(TaskId, BTreeSet<TaskId>)> = graph
        .iter()
        .filter(|d| d.dependencies.iter().any(|dep| !graph.contains(dep)))
        .map(|d| {
            let kept = d
                .dependencies
                .iter()
                .filter(|dep| {
                    let known = graph.contains(dep);
                    if !known {
                        debug!(task = %d.id, dependency = %dep, "dropping dangling dependency");
                    }
                    known
                })
                .cloned()
                .collect();
            (d.id.clone(), kept)
        })
        .collect();

    let mut changed = false;
    for (id, deps) in updates {
        changed |= graph.set_dependencies(&id, deps);
    }
    changed
}

fn prune_unused_dependency_only(graph: &mut PlanGraph, options: &ValidationOptions) -> bool {
    if options.dependency_only.is_empty() {
        return false;
    }

    let dag = DagGraph::from_plan(graph);
    let unused: Vec<TaskId> = graph
        .iter()
        .filter(|d| options.dependency_only.contains(&d.task_type))
        .filter(|d| dag.dependents_of(&d.id).iter().all(|dependent| dependent == &d.id))
        .map(|d| d.id.clone())
        .collect();

    for id in unused.iter() {
        debug!(task = %id, "dropping dependency-only task with no dependents");
        graph.remove(id);
    }
    !unused.is_empty()
}

fn missing_dependency_violations(graph: &PlanGraph, options: &ValidationOptions) -> Vec<TaskId> {
    graph
        .iter()
        .filter(|d| options.require_dependencies.contains(&d.task_type))
        .filter(|d| d.dependencies.is_empty())
        .map(|d| d.id.clone())
        .collect()
}

/// Kahn's algorithm, layer by layer. Each layer is in id order.
///
/// On failure returns the ids that could not be ordered.
fn kahn_layers(graph: &PlanGraph) -> std::result::Result<Vec<Vec<TaskId>>, Vec<TaskId>> {
    let mut ordered: BTreeSet<&str> = BTreeSet::new();
    let mut remaining: BTreeSet<&str> = graph.ids().collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let layer: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|id| {
                graph
                    .get(id)
                    .map(|d| d.dependencies.iter().all(|dep| ordered.contains(dep.as_str())))
                    .unwrap_or(false)
            })
            .collect();

        if layer.is_empty() {
            return Err(remaining.into_iter().map(str::to_string).collect());
        }

        for id in layer.iter() {
            remaining.remove(id);
            ordered.insert(*id);
        }
        layers.push(layer.into_iter().map(str::to_string).collect());
    }

    Ok(layers)
}

/// Group the unorderable tasks into the cycles that block them.
fn cycle_groups(graph: &PlanGraph, stuck: &[TaskId]) -> Vec<Vec<TaskId>> {
    let dag = DagGraph::from_plan(graph);
    let graphmap = dag.to_graphmap();
    let stuck: BTreeSet<&str> = stuck.iter().map(|s| s.as_str()).collect();

    let mut groups: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
    for component in tarjan_scc(&graphmap) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|n| graphmap.contains_edge(*n, *n));
        if !is_cycle || !component.iter().all(|n| stuck.contains(n)) {
            continue;
        }
        let mut members: Vec<TaskId> = component.iter().map(|n| n.to_string()).collect();
        members.sort();
        groups.insert(members[0].clone(), members);
    }

    groups.into_values().collect()
}
