// src/render/diagram.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::plan::PlanGraph;
use crate::types::{TaskId, TaskState};

static DISALLOWED_ID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex is valid"));

const MAX_LABEL_CHARS: usize = 60;

/// Fixed style classes, one per task state.
const CLASS_DEFS: &[&str] = &[
    "classDef pending fill:#f4f4f4,stroke:#999,color:#333",
    "classDef inprogress fill:#fff4cc,stroke:#d4a017,color:#333",
    "classDef completed fill:#d9f2d9,stroke:#2e8b57,color:#333",
];

/// Style shared by every `type_<tag>` class.
const TYPE_CLASS_STYLE: &str = "fill:#ffffff,stroke:#666,color:#333";

/// Render `graph` as a Mermaid flowchart.
///
/// Nodes carry the style class of their state in `states`; tasks absent from
/// `states` get a class derived from their type (`type_<tag>`), and a
/// `classDef` is emitted for each such class in use. Edges point from
/// dependency to dependent. Output is a pure function of the input.
pub fn render(graph: &PlanGraph, states: &BTreeMap<TaskId, TaskState>) -> String {
    let names = node_names(graph);
    let mut type_classes: BTreeSet<String> = BTreeSet::new();
    let mut out = String::from("flowchart TD\n");

    for task in graph.iter() {
        let name = &names[&task.id];
        let class = match states.get(&task.id) {
            Some(state) => state.style_class().to_string(),
            None => {
                let class = format!("type_{}", sanitize_id(&task.task_type));
                type_classes.insert(class.clone());
                class
            }
        };
        let _ = writeln!(out, "    {name}[\"{}\"]:::{class}", escape_label(&label_for(&task.id, &task.description)));
    }

    for task in graph.iter() {
        for dep in task.dependencies.iter() {
            if let Some(from) = names.get(dep) {
                let _ = writeln!(out, "    {from} --> {}", names[&task.id]);
            }
        }
    }

    for def in CLASS_DEFS {
        let _ = writeln!(out, "    {def}");
    }
    for class in type_classes {
        let _ = writeln!(out, "    classDef {class} {TYPE_CLASS_STYLE}");
    }

    out
}

/// Replace characters that Mermaid does not accept in node ids.
pub fn sanitize_id(id: &str) -> String {
    let cleaned = DISALLOWED_ID_CHARS.replace_all(id, "_").into_owned();
    // "end" is a keyword; an empty id is not a node.
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("end") {
        format!("t_{cleaned}")
    } else {
        cleaned
    }
}

/// Assign every task a unique sanitized node name, in id order.
fn node_names(graph: &PlanGraph) -> BTreeMap<TaskId, String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut names = BTreeMap::new();

    for id in graph.ids() {
        let base = sanitize_id(id);
        let mut candidate = base.clone();
        let mut n = 2;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        names.insert(id.to_string(), candidate);
    }

    names
}

fn label_for(id: &str, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        return id.to_string();
    }

    let first_line = description.lines().next().unwrap_or_default();
    let mut short: String = first_line.chars().take(MAX_LABEL_CHARS).collect();
    if first_line.chars().count() > MAX_LABEL_CHARS || description.lines().nth(1).is_some() {
        short.push_str("...");
    }
    format!("{id}: {short}")
}

fn escape_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '#' => out.push_str("&#35;"),
            _ => out.push(ch),
        }
    }
    out
}
