//! Recipe and component loading tests

use sous::recipe::{load_recipe, ControlFlow, ExecutionMode};
use sous::{ComponentRegistry, RecipeError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_recipe_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("backup.yml");
    fs::write(
        &path,
        r#"
name: backup
description: Nightly backup
operations:
  - id: dump
    command: pg_dump app
    execution_mode: background
  - control_flow:
      type: foreach
      collection: "{{ .targets }}"
    operations:
      - command: "rsync dump {{ .item }}"
"#,
    )
    .unwrap();

    let recipe = load_recipe(&path).unwrap();
    assert_eq!(recipe.name, "backup");
    assert_eq!(recipe.operations[0].execution_mode, ExecutionMode::Background);
    match recipe.operations[1].control_flow.as_ref().unwrap() {
        ControlFlow::ForEach(c) => assert_eq!(c.alias, "item"),
        other => panic!("Expected foreach, got {:?}", other),
    }
}

#[test]
fn test_load_recipe_errors_name_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yml");
    fs::write(&path, "name: [unterminated").unwrap();

    let err = load_recipe(&path).unwrap_err();
    assert!(matches!(err, RecipeError::Load { .. }));
    assert!(err.to_string().contains("broken.yml"));

    let missing = load_recipe(&dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(missing, RecipeError::Load { .. }));
}

#[test]
fn test_registry_load_dir() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(
        dir.path().join("build.yml"),
        "id: build\noperations:\n  - command: make\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("nested").join("many.yaml"),
        "components:\n  - id: lint\n  - id: fmt\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

    let mut registry = ComponentRegistry::new();
    let loaded = registry.load_dir(dir.path()).unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(registry.ids(), vec!["build", "fmt", "lint"]);

    registry.clear();
    assert!(registry.is_empty());
}

#[test]
fn test_registry_load_dir_requires_directory() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("file.yml");
    fs::write(&file, "id: x\n").unwrap();
    let mut registry = ComponentRegistry::new();
    assert!(registry.load_dir(&file).is_err());
}
