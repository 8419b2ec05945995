// src/render/cache.rs

use std::collections::{BTreeMap, HashMap};

use blake3::Hasher;
use tracing::debug;

use crate::plan::PlanGraph;
use crate::render::diagram::render;
use crate::types::{TaskId, TaskState};

const DEFAULT_MAX_ENTRIES: usize = 64;

/// Memoized diagram renders keyed by a structural hash of (graph, states).
///
/// Owned by whoever displays diagrams; there is no process-wide cache.
#[derive(Debug)]
pub struct DiagramCache {
    entries: HashMap<String, String>,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

impl Default for DiagramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached diagram for this input, rendering it on a miss.
    pub fn get_or_render(&mut self, graph: &PlanGraph, states: &BTreeMap<TaskId, TaskState>) -> String {
        let key = structural_hash(graph, states);
        if let Some(diagram) = self.entries.get(&key) {
            self.hits += 1;
            return diagram.clone();
        }

        self.misses += 1;
        debug!(key = %key, "diagram cache miss; rendering");
        let diagram = render(graph, states);

        if self.entries.len() >= self.max_entries {
            debug!(entries = self.entries.len(), "diagram cache full; clearing");
            self.entries.clear();
        }
        self.entries.insert(key, diagram.clone());
        diagram
    }

    /// Drop the entry for this exact input, if present.
    pub fn invalidate(&mut self, graph: &PlanGraph, states: &BTreeMap<TaskId, TaskState>) -> bool {
        self.entries.remove(&structural_hash(graph, states)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// BLAKE3 over every field that influences the rendered output.
///
/// Strings are length-prefixed so that adjacent fields cannot run together.
pub fn structural_hash(graph: &PlanGraph, states: &BTreeMap<TaskId, TaskState>) -> String {
    let mut hasher = Hasher::new();

    for task in graph.iter() {
        update_str(&mut hasher, &task.id);
        update_str(&mut hasher, &task.task_type);
        update_str(&mut hasher, &task.description);
        hasher.update(&(task.dependencies.len() as u64).to_le_bytes());
        for dep in task.dependencies.iter() {
            update_str(&mut hasher, dep);
        }
        let state_tag: u8 = match states.get(&task.id) {
            None => 0,
            Some(TaskState::Pending) => 1,
            Some(TaskState::InProgress) => 2,
            Some(TaskState::Completed) => 3,
        };
        hasher.update(&[state_tag]);
    }

    hasher.finalize().to_hex().to_string()
}

fn update_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
