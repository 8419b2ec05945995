// tests/ordering_properties.rs

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::PlanBuilder;
use plandag::dag::{validate, ValidationOptions};
use plandag::plan::RawPlan;
use proptest::prelude::*;

// Acyclic by construction: task N may only depend on tasks 0..N-1. Some
// dependencies point at ids that do not exist, to exercise pruning.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = RawPlan> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        );
        let dangling_strat = proptest::collection::vec(any::<bool>(), num_tasks);

        (deps_strat, dangling_strat).prop_map(move |(raw_deps, dangling)| {
            let mut builder = PlanBuilder::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let mut deps: BTreeSet<String> = BTreeSet::new();
                if i > 0 {
                    for d in potential {
                        deps.insert(format!("task_{:02}", d % i));
                    }
                }
                if dangling[i] {
                    deps.insert(format!("missing_{i}"));
                }
                let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                builder = builder.task(&format!("task_{i:02}"), "echo", &deps);
            }
            builder.build()
        })
    })
}

proptest! {
    #[test]
    fn every_task_comes_after_its_dependencies(plan in dag_strategy(12)) {
        let task_count = plan.len();
        let validated = validate(plan, &ValidationOptions::default()).unwrap();

        prop_assert_eq!(validated.order.len(), task_count);

        let position: BTreeMap<&str, usize> = validated
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for task in validated.graph.iter() {
            for dep in task.dependencies.iter() {
                prop_assert!(validated.graph.contains(dep), "dangling edge {} -> {}", dep, task.id);
                prop_assert!(position[dep.as_str()] < position[task.id.as_str()]);
            }
        }
    }

    #[test]
    fn layers_concatenate_to_the_order(plan in dag_strategy(12)) {
        let validated = validate(plan, &ValidationOptions::default()).unwrap();
        let flattened: Vec<String> = validated.layers.iter().flatten().cloned().collect();
        prop_assert_eq!(flattened, validated.order);
    }
}
