// tests/plan_loading.rs

use std::io::Write;

use plandag::errors::PlanError;
use plandag::plan::{load_plan_from_path, parse_plan, PlanGraph};
use tempfile::NamedTempFile;

const PLAN: &str = r#"{
  "fetch": { "task_type": "shell", "task_description": "curl example.org" },
  "summarize": {
    "task_type": "echo",
    "task_description": "summarize the page",
    "task_dependencies": ["fetch"],
    "state": "completed"
  }
}"#;

#[test]
fn plan_json_is_parsed() {
    let plan = parse_plan(PLAN).unwrap();

    assert_eq!(plan.len(), 2);
    let graph = PlanGraph::from_raw(&plan);
    let summarize = graph.get("summarize").unwrap();
    assert_eq!(summarize.task_type, "echo");
    assert!(summarize.dependencies.contains("fetch"));
    assert!(graph.get("fetch").unwrap().dependencies.is_empty());
}

#[test]
fn fenced_plan_is_accepted() {
    let fenced = format!("```json\n{PLAN}\n```\n");
    let plan = parse_plan(&fenced).unwrap();
    assert_eq!(plan.len(), 2);
}

#[test]
fn empty_plan_text_is_rejected() {
    assert!(matches!(parse_plan("   "), Err(PlanError::InvalidPlan(_))));
    assert!(matches!(parse_plan("```json\n```"), Err(PlanError::InvalidPlan(_))));
}

#[test]
fn malformed_json_is_a_json_error() {
    assert!(matches!(parse_plan("{ not json"), Err(PlanError::JsonError(_))));
    assert!(matches!(
        parse_plan(r#"{"a": {"task_description": "no type"}}"#),
        Err(PlanError::JsonError(_))
    ));
}

#[test]
fn oracle_state_is_not_written_back() {
    let graph = PlanGraph::from_raw(&parse_plan(PLAN).unwrap());
    let json = graph.to_json().unwrap();

    assert!(!json.contains("\"state\""));
    assert_eq!(parse_plan(&json).unwrap(), graph.to_raw());
}

#[test]
fn plan_file_is_loaded() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{PLAN}").unwrap();

    let plan = load_plan_from_path(file.path()).unwrap();
    assert_eq!(plan.len(), 2);

    assert!(matches!(
        load_plan_from_path("/definitely/not/here.json"),
        Err(PlanError::IoError(_))
    ));
}
