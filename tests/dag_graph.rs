// tests/dag_graph.rs

mod common;

use common::PlanBuilder;
use plandag::dag::DagGraph;
use plandag::plan::PlanGraph;
use petgraph::algo::toposort;

fn chain_with_branch() -> DagGraph {
    // root -> mid -> leaf, root -> side, plus a dangling edge on side
    let plan = PlanBuilder::new()
        .task("root", "echo", &[])
        .task("mid", "echo", &["root"])
        .task("leaf", "echo", &["mid"])
        .task("side", "echo", &["root", "ghost"])
        .build();
    DagGraph::from_plan(&PlanGraph::from_raw(&plan))
}

#[test]
fn adjacency_ignores_unknown_ids() {
    let dag = chain_with_branch();

    assert_eq!(dag.len(), 4);
    assert_eq!(dag.dependencies_of("side"), ["root".to_string()]);
    assert_eq!(dag.dependents_of("root"), ["mid".to_string(), "side".to_string()]);
    assert!(dag.dependencies_of("ghost").is_empty());
    assert_eq!(dag.roots(), vec!["root".to_string()]);
}

#[test]
fn transitive_dependencies_follow_the_chain() {
    let dag = chain_with_branch();

    let deps: Vec<String> = dag.transitive_dependencies_of("leaf").into_iter().collect();
    assert_eq!(deps, vec!["mid".to_string(), "root".to_string()]);
    assert!(dag.transitive_dependencies_of("root").is_empty());
}

#[test]
fn graphmap_edges_point_at_dependents() {
    let dag = chain_with_branch();
    let graph = dag.to_graphmap();

    assert!(graph.contains_edge("root", "mid"));
    assert!(!graph.contains_edge("mid", "root"));
    let order = toposort(&graph, None).unwrap();
    assert_eq!(order.first().copied(), Some("root"));
}
