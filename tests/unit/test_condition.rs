//! Condition evaluator tests

use sous::engine::condition::evaluate;
use sous::engine::context::ExecutionContext;
use sous::{RecipeError, Value};

fn ctx() -> ExecutionContext {
    let ctx = ExecutionContext::new(false);
    ctx.set_var("env", "prod");
    ctx.set_var("count", Value::Int(5));
    ctx.set_output("build", "ok");
    ctx.set_result("build", true);
    ctx.set_result("lint", false);
    ctx
}

#[test]
fn test_empty_is_true() {
    assert!(evaluate("", &ctx()).unwrap());
    assert!(evaluate("   ", &ctx()).unwrap());
}

#[test]
fn test_equality_forms() {
    let c = ctx();
    assert!(evaluate("$env == prod", &c).unwrap());
    assert!(evaluate(".env == 'prod'", &c).unwrap());
    assert!(evaluate("env == \"prod\"", &c).unwrap());
    assert!(evaluate("$env != staging", &c).unwrap());
    assert!(evaluate("$build == ok", &c).unwrap());
}

#[test]
fn test_missing_variable_is_false() {
    let c = ctx();
    assert!(evaluate("$nope == false", &c).unwrap());
    assert!(evaluate("$nope < 1", &c).unwrap());
}

#[test]
fn test_numeric_comparisons() {
    let c = ctx();
    assert!(evaluate("$count >= 5", &c).unwrap());
    assert!(evaluate("$count > 4.5", &c).unwrap());
    assert!(!evaluate("$count < 5", &c).unwrap());
    assert!(matches!(
        evaluate("$env > 1", &c),
        Err(RecipeError::UnsupportedCondition(_))
    ));
}

#[test]
fn test_results() {
    let c = ctx();
    assert!(evaluate("build.success", &c).unwrap());
    assert!(evaluate("$lint.failure", &c).unwrap());
    assert!(evaluate("never_ran.failure", &c).unwrap());
    assert!(!evaluate("never_ran.success", &c).unwrap());
}

#[test]
fn test_boolean_composition() {
    let c = ctx();
    assert!(evaluate("build.success && $env == prod", &c).unwrap());
    assert!(!evaluate("build.success && lint.success", &c).unwrap());
    assert!(evaluate("lint.success || $count > 1", &c).unwrap());
    assert!(evaluate("!lint.success", &c).unwrap());
    assert!(evaluate("(build.success) && ($count == 5)", &c).unwrap());
}

#[test]
fn test_template_is_rendered_once() {
    let c = ctx();
    assert!(evaluate("{{ gt .count 3 }}", &c).unwrap());
    assert!(evaluate("{{ .env }} == prod", &c).unwrap());
    assert!(!evaluate("{{ if false }}true{{ end }}", &c).unwrap());
}

#[test]
fn test_unsupported() {
    assert!(matches!(
        evaluate("maybe", &ctx()),
        Err(RecipeError::UnsupportedCondition(_))
    ));
}
