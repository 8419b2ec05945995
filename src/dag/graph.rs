// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graphmap::DiGraphMap;

use crate::plan::PlanGraph;
use crate::types::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one starts.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskId>,
}

/// In-memory adjacency view of a plan, keyed by task id.
///
/// Edges to ids that are not part of the plan are ignored, so this can be
/// built from unvalidated graphs as well.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskId, DagNode>,
}

impl DagGraph {
    pub fn from_plan(plan: &PlanGraph) -> Self {
        let mut nodes: BTreeMap<TaskId, DagNode> = plan
            .ids()
            .map(|id| (id.to_string(), DagNode::default()))
            .collect();

        for task in plan.iter() {
            for dep in task.dependencies.iter() {
                if !nodes.contains_key(dep) {
                    continue;
                }
                if let Some(node) = nodes.get_mut(&task.id) {
                    node.deps.push(dep.clone());
                }
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(task.id.clone());
                }
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without dependencies.
    pub fn roots(&self) -> Vec<TaskId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every task reachable by following dependency edges from `id`,
    /// excluding `id` itself.
    pub fn transitive_dependencies_of(&self, id: &str) -> BTreeSet<TaskId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependencies_of(id).iter().map(|s| s.as_str()).collect();

        while let Some(name) = stack.pop() {
            if name == id || !seen.insert(name.to_string()) {
                continue;
            }
            stack.extend(self.dependencies_of(name).iter().map(|s| s.as_str()));
        }

        seen
    }

    /// Petgraph view with edges pointing from dependency to dependent.
    pub fn to_graphmap(&self) -> DiGraphMap<&str, ()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for (id, node) in self.nodes.iter() {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        graph
    }
}
