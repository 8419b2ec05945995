// tests/diagram.rs

mod common;

use std::collections::BTreeMap;

use common::PlanBuilder;
use plandag::plan::PlanGraph;
use plandag::render::{render, sanitize_id, DiagramCache};
use plandag::types::{TaskId, TaskState};

fn diamond() -> PlanGraph {
    PlanGraph::from_raw(
        &PlanBuilder::new()
            .task("A", "echo", &[])
            .task("B", "echo", &["A"])
            .task("C", "shell", &["A"])
            .task("D", "echo", &["B", "C"])
            .build(),
    )
}

#[test]
fn diamond_has_four_edges_from_dependency_to_dependent() {
    let diagram = render(&diamond(), &BTreeMap::new());

    assert!(diagram.starts_with("flowchart TD\n"));
    for edge in ["A --> B", "A --> C", "B --> D", "C --> D"] {
        assert!(diagram.contains(edge), "missing edge {edge} in:\n{diagram}");
    }
    assert_eq!(diagram.matches("-->").count(), 4);
}

#[test]
fn class_comes_from_state_or_type() {
    let mut states: BTreeMap<TaskId, TaskState> = BTreeMap::new();
    states.insert("A".into(), TaskState::Completed);
    states.insert("B".into(), TaskState::InProgress);

    let diagram = render(&diamond(), &states);

    assert!(diagram.contains(":::completed"));
    assert!(diagram.contains(":::inprogress"));
    assert!(diagram.contains(":::type_shell"));
    assert!(diagram.contains(":::type_echo"));
    assert!(diagram.contains("classDef pending"));
}

#[test]
fn every_used_class_has_a_class_def() {
    let mut states: BTreeMap<TaskId, TaskState> = BTreeMap::new();
    states.insert("A".into(), TaskState::Pending);

    let diagram = render(&diamond(), &states);

    for line in diagram.lines().filter(|l| l.contains(":::")) {
        let class = line.rsplit(":::").next().unwrap();
        assert!(
            diagram.contains(&format!("classDef {class} ")),
            "no classDef for {class} in:\n{diagram}"
        );
    }
    assert_eq!(diagram.matches("classDef type_echo ").count(), 1);
    assert_eq!(diagram.matches("classDef type_shell ").count(), 1);
}

#[test]
fn ids_are_sanitized_and_kept_unique() {
    assert_eq!(sanitize_id("fetch data"), "fetch_data");
    assert_eq!(sanitize_id("end"), "t_end");
    assert_eq!(sanitize_id(""), "t_");

    let graph = PlanGraph::from_raw(
        &PlanBuilder::new()
            .task("a b", "echo", &[])
            .task("a-b", "echo", &["a b"])
            .build(),
    );
    let diagram = render(&graph, &BTreeMap::new());

    assert!(diagram.contains("    a_b[\""));
    assert!(diagram.contains("    a_b_2[\""));
    assert!(diagram.contains("a_b --> a_b_2"));
}

#[test]
fn labels_are_escaped_and_truncated() {
    let long = "x".repeat(100);
    let graph = PlanGraph::from_raw(
        &PlanBuilder::new()
            .task_with_description("q", "echo", "say \"hi\" <now> #1", &[])
            .task_with_description("long", "echo", &long, &[])
            .build(),
    );
    let diagram = render(&graph, &BTreeMap::new());

    assert!(diagram.contains("&quot;hi&quot; &lt;now&gt; &#35;1"));
    assert!(diagram.contains(&format!("long: {}...", "x".repeat(60))));
    assert!(!diagram.contains(&"x".repeat(61)));
}

#[test]
fn rendering_is_deterministic() {
    let a = render(&diamond(), &BTreeMap::new());
    let b = render(&diamond(), &BTreeMap::new());
    assert_eq!(a, b);
}

#[test]
fn cache_hits_until_invalidated() {
    let graph = diamond();
    let states = BTreeMap::new();
    let mut cache = DiagramCache::new();

    let first = cache.get_or_render(&graph, &states);
    let second = cache.get_or_render(&graph, &states);
    assert_eq!(first, second);
    assert_eq!((cache.hits(), cache.misses()), (1, 1));

    assert!(cache.invalidate(&graph, &states));
    cache.get_or_render(&graph, &states);
    assert_eq!(cache.misses(), 2);

    let mut changed = states.clone();
    changed.insert("A".to_string(), TaskState::Completed);
    let third = cache.get_or_render(&graph, &changed);
    assert_ne!(third, first);
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
}
