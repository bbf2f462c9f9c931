//! Component expansion tests

use sous::engine::expander::expand;
use sous::recipe::Operation;
use sous::{ComponentRegistry, Recipe, RecipeError};
use std::collections::HashMap;

const COMPONENTS: &str = r#"
components:
  - id: checkout
    description: Fetch sources
    operations:
      - id: clone
        command: git clone repo
      - id: sha
        command: git rev-parse HEAD
  - id: notify
    operations:
      - command: echo done
  - id: pipeline
    operations:
      - uses: checkout
      - id: test
        command: make test
  - id: loop-a
    operations:
      - uses: loop-b
  - id: loop-b
    operations:
      - uses: loop-a
"#;

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.load_yaml(COMPONENTS).unwrap();
    registry
}

fn ops(yaml: &str) -> Vec<Operation> {
    Recipe::from_yaml(yaml).unwrap().operations
}

#[test]
fn test_copy_step_keeps_referencing_id() {
    let mut op_map = HashMap::new();
    let expanded = expand(
        &ops("name: r\noperations:\n  - id: src\n    uses: checkout\n    on_failure: alert\n"),
        &registry(),
        &mut op_map,
    )
    .unwrap();

    assert_eq!(expanded.len(), 3);
    let copy = &expanded[2];
    assert_eq!(copy.id, "src");
    assert_eq!(copy.copy_from.as_deref(), Some("sha"));
    assert!(copy.on_failure.is_empty());
    assert_eq!(expanded[1].on_failure, "alert");
    assert!(copy.silent);
    assert!(op_map.contains_key("clone"));
    assert!(op_map.contains_key("src"));
}

#[test]
fn test_final_op_without_id_takes_it_over() {
    let mut op_map = HashMap::new();
    let expanded = expand(
        &ops("name: r\noperations:\n  - id: ping\n    uses: notify\n    exit: true\n"),
        &registry(),
        &mut op_map,
    )
    .unwrap();
    assert_eq!(expanded.len(), 1);
    assert_eq!(expanded[0].id, "ping");
    assert_eq!(expanded[0].command, "echo done");
    assert!(expanded[0].exit);
}

#[test]
fn test_condition_and_silent_reach_every_root() {
    let mut op_map = HashMap::new();
    let expanded = expand(
        &ops("name: r\noperations:\n  - uses: checkout\n    condition: \"$fresh == true\"\n    silent: true\n"),
        &registry(),
        &mut op_map,
    )
    .unwrap();
    assert!(expanded.iter().all(|op| op.condition == "$fresh == true"));
    assert!(expanded.iter().all(|op| op.silent));
}

#[test]
fn test_nested_components_and_loop_children() {
    let mut op_map = HashMap::new();
    let expanded = expand(
        &ops(
            r#"
name: r
operations:
  - control_flow:
      type: for
      count: 2
    operations:
      - uses: pipeline
"#,
        ),
        &registry(),
        &mut op_map,
    )
    .unwrap();
    let children: Vec<&str> = expanded[0]
        .operations
        .iter()
        .map(|op| op.id.as_str())
        .collect();
    assert_eq!(children, vec!["clone", "sha", "test"]);
    assert!(op_map.contains_key("test"));
}

#[test]
fn test_expansion_is_idempotent() {
    let registry = registry();
    let source = ops("name: r\noperations:\n  - id: src\n    uses: pipeline\n");
    let mut first_map = HashMap::new();
    let once = expand(&source, &registry, &mut first_map).unwrap();
    let mut second_map = HashMap::new();
    let twice = expand(&once, &registry, &mut second_map).unwrap();
    assert_eq!(once, twice);
    assert_eq!(first_map.len(), second_map.len());
}

#[test]
fn test_missing_component() {
    let mut op_map = HashMap::new();
    let err = expand(
        &ops("name: r\noperations:\n  - uses: nowhere\n"),
        &registry(),
        &mut op_map,
    )
    .unwrap_err();
    assert!(matches!(err, RecipeError::ComponentNotFound(id) if id == "nowhere"));
}

#[test]
fn test_mutual_reference_is_recursion_limit() {
    let mut op_map = HashMap::new();
    let err = expand(
        &ops("name: r\noperations:\n  - uses: loop-a\n"),
        &registry(),
        &mut op_map,
    )
    .unwrap_err();
    assert!(matches!(err, RecipeError::RecursionLimit { .. }));
}
