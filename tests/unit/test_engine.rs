//! Engine tests through the public API
//!
//! Tests cover:
//! - variable seeding precedence
//! - output formats and silent operations
//! - background re-launch under the same id
//! - components loaded from YAML
//! - JSON shape of the run outcome

use sous::engine::background::TaskStatus;
use sous::output::Output;
use sous::{ComponentRegistry, Config, Engine, Recipe, RunOutcome, StaticPrompter, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    registry: ComponentRegistry,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            registry: ComponentRegistry::new(),
        }
    }

    fn engine(&self) -> Engine {
        Engine::new(
            Config::default(),
            self.registry.clone(),
            Arc::new(StaticPrompter::new(true)),
        )
        .with_workdir(self.dir.path())
        .with_output(Output::quiet())
    }

    async fn run(&self, yaml: &str, vars: &[(&str, Value)]) -> RunOutcome {
        let recipe = Recipe::from_yaml(yaml).unwrap();
        let vars: HashMap<String, Value> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.engine().run(&recipe, "", vars, false).await.unwrap()
    }
}

#[tokio::test]
async fn test_cli_vars_override_recipe_defaults() {
    let h = Harness::new();
    let outcome = h
        .run(
            r#"
name: greet
vars:
  who: world
  greeting: hello
operations:
  - id: line
    command: "echo {{ .greeting }} {{ .who }}"
"#,
            &[("who", Value::from("sous"))],
        )
        .await;
    assert_eq!(outcome.outputs["line"], "hello sous");
}

#[tokio::test]
async fn test_commands_run_in_workdir() {
    let h = Harness::new();
    std::fs::write(h.dir.path().join("marker.txt"), "here").unwrap();
    let outcome = h
        .run(
            r#"
name: cwd
operations:
  - id: cat
    command: cat marker.txt
  - id: var
    command: "echo {{ .workdir }}"
"#,
            &[],
        )
        .await;
    assert_eq!(outcome.outputs["cat"], "here");
    assert_eq!(outcome.outputs["var"], h.dir.path().display().to_string());
}

#[tokio::test]
async fn test_lines_format_feeds_foreach() {
    let h = Harness::new();
    let outcome = h
        .run(
            r#"
name: fanout
operations:
  - id: hosts
    command: "printf 'web\n\n  db  \n'"
    output_format: lines
    silent: true
  - control_flow:
      type: foreach
      collection: "{{ .hosts }}"
      as: host
    operations:
      - id: "ping-{{ .host }}"
        command: "echo pong {{ .host }}"
"#,
            &[],
        )
        .await;
    assert_eq!(outcome.outputs["hosts"], "web\ndb");
    assert_eq!(outcome.outputs["ping-web"], "pong web");
    assert_eq!(outcome.outputs["ping-db"], "pong db");
}

#[tokio::test]
async fn test_background_relaunch_keeps_latest_run() {
    let h = Harness::new();
    let outcome = h
        .run(
            r#"
name: relaunch
operations:
  - control_flow:
      type: for
      count: 2
    operations:
      - id: job
        command: "sleep 0.2; echo run-{{ .i }}"
        execution_mode: background
"#,
            &[],
        )
        .await;
    assert_eq!(outcome.tasks.len(), 1);
    assert_eq!(outcome.tasks[0].status, TaskStatus::Complete);
    assert_eq!(outcome.outputs["job"], "run-1");
}

#[tokio::test]
async fn test_background_placeholder_is_pending() {
    let h = Harness::new();
    let outcome = h
        .run(
            r#"
name: placeholder
operations:
  - id: slow
    command: "sleep 0.2; echo finished"
    execution_mode: background
  - id: peek
    command: "echo saw {{ .slow }}"
"#,
            &[],
        )
        .await;
    assert_eq!(outcome.outputs["peek"], "saw pending");
    assert_eq!(outcome.outputs["slow"], "finished");
}

#[tokio::test]
async fn test_registry_components_run() {
    let mut h = Harness::new();
    h.registry
        .load_yaml(
            r#"
components:
  - id: version
    operations:
      - id: read
        command: "echo 1.2.3"
        transform: "v{{ .output }}"
"#,
        )
        .unwrap();
    let outcome = h
        .run(
            r#"
name: release
operations:
  - id: tag
    uses: version
  - id: push
    condition: "tag.success"
    command: "echo pushing {{ .tag }}"
"#,
            &[],
        )
        .await;
    assert_eq!(outcome.outputs["tag"], "v1.2.3");
    assert_eq!(outcome.outputs["push"], "pushing v1.2.3");
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let h = Harness::new();
    let outcome = h
        .run(
            r#"
name: json
operations:
  - id: hello
    command: echo hi
"#,
            &[],
        )
        .await;
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["exited"], false);
    assert_eq!(json["outputs"]["hello"], "hi");
    assert_eq!(json["results"]["hello"], true);
    assert!(json["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_is_reusable_across_runs() {
    let h = Harness::new();
    let engine = h.engine();
    let recipe = Recipe::from_yaml(
        r#"
name: counter
operations:
  - id: seen
    command: "echo {{ .previous }}"
"#,
    )
    .unwrap();

    let first = engine.run(&recipe, "", HashMap::new(), false).await.unwrap();
    let second = engine.run(&recipe, "", HashMap::new(), false).await.unwrap();
    assert_eq!(first.outputs["seen"], "false");
    assert_eq!(second.outputs, first.outputs);
}
