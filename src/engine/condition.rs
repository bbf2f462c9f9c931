//! Condition Evaluator
//!
//! A deliberately small boolean language used by `condition` fields and
//! `while` predicates. Forms are tried in a fixed order:
//!
//! 1. template delimiters: render once, then evaluate the result
//! 2. `a && b`, then `a || b`
//! 3. `!expr`
//! 4. numeric `>=`, `<=`, `>`, `<`
//! 5. `<id>.success` / `<id>.failure`
//! 6. `!=`, `==` (left side resolved, right side literal)
//! 7. literal `true` / `false`
//!
//! Anything else is an [`RecipeError::UnsupportedCondition`].

use super::context::ExecutionContext;
use super::template::{self, TemplateData};
use crate::errors::{RecipeError, Result};
use std::cmp::Ordering;

const NUMERIC_OPS: [&str; 4] = [">=", "<=", ">", "<"];

/// Evaluate a condition string. An empty condition is true.
pub fn evaluate(expr: &str, ctx: &ExecutionContext) -> Result<bool> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(true);
    }
    if template::has_template(expr) {
        let rendered = template::render(expr, ctx)?;
        let rendered = rendered.trim();
        if rendered.is_empty() {
            return Ok(false);
        }
        return eval(rendered, ctx);
    }
    eval(expr, ctx)
}

fn eval(expr: &str, ctx: &ExecutionContext) -> Result<bool> {
    let expr = strip_parens(expr.trim());

    if let Some(parts) = split_top_level(expr, "&&")? {
        for part in parts {
            if !eval(part, ctx)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(parts) = split_top_level(expr, "||")? {
        for part in parts {
            if eval(part, ctx)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    if let Some(rest) = expr.strip_prefix('!') {
        if !rest.starts_with('=') {
            return Ok(!eval(rest, ctx)?);
        }
    }

    for op in NUMERIC_OPS {
        if let Some((left, right)) = expr.split_once(op) {
            return compare_numbers(expr, op, left, right, ctx);
        }
    }

    if let Some(id) = expr.strip_suffix(".success") {
        return Ok(ctx.result(strip_sigil(id.trim())).unwrap_or(false));
    }
    if let Some(id) = expr.strip_suffix(".failure") {
        return Ok(!ctx.result(strip_sigil(id.trim())).unwrap_or(false));
    }

    if let Some((left, right)) = expr.split_once("!=") {
        return Ok(resolve(left, ctx) != unquote(right));
    }
    if let Some((left, right)) = expr.split_once("==") {
        return Ok(resolve(left, ctx) == unquote(right));
    }

    match expr {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RecipeError::UnsupportedCondition(expr.to_string())),
    }
}

fn compare_numbers(
    expr: &str,
    op: &str,
    left: &str,
    right: &str,
    ctx: &ExecutionContext,
) -> Result<bool> {
    let number = |side: &str| {
        let text = resolve(side, ctx);
        Number::parse(&text).ok_or_else(|| {
            RecipeError::UnsupportedCondition(format!(
                "{}: {:?} is not a number",
                expr, text
            ))
        })
    };
    let ordering = number(left)?.compare(number(right)?);
    Ok(match op {
        ">=" => ordering.is_ge(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        _ => ordering.is_lt(),
    })
}

/// Numeric operand. Integers compare exactly; anything with a fraction or
/// exponent falls back to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// `false` (what an absent variable resolves to) counts as zero; other
    /// words, `true` included, and non-finite floats are not numbers.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "false" {
            return Some(Number::Int(0));
        }
        if let Ok(n) = text.parse::<i64>() {
            return Some(Number::Int(n));
        }
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Number::Float)
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }
}

/// Split `expr` on every `sep` outside parentheses. `None` when `sep` only
/// occurs inside a group.
fn split_top_level<'a>(expr: &'a str, sep: &str) -> Result<Option<Vec<&'a str>>> {
    if !expr.contains(sep) {
        return Ok(None);
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    let bytes = expr.as_bytes();
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(unbalanced(expr));
                }
            }
            _ if depth == 0 && bytes[i..].starts_with(sep.as_bytes()) => {
                parts.push(&expr[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 {
        return Err(unbalanced(expr));
    }
    if parts.is_empty() {
        return Ok(None);
    }
    parts.push(&expr[start..]);
    Ok(Some(parts))
}

fn unbalanced(expr: &str) -> RecipeError {
    RecipeError::UnsupportedCondition(format!("{}: unbalanced parentheses", expr))
}

/// Resolve an operand: `$name`/`.name` look up vars then outputs (absent is
/// `false`); a bare word is looked up too and otherwise taken literally.
fn resolve(token: &str, ctx: &ExecutionContext) -> String {
    let token = token.trim();
    if let Some(name) = token.strip_prefix('$').or_else(|| token.strip_prefix('.')) {
        return ctx
            .lookup(name)
            .map(|v| v.render().trim().to_string())
            .unwrap_or_else(|| "false".to_string());
    }
    let literal = unquote(token);
    ctx.lookup(&literal)
        .map(|v| v.render().trim().to_string())
        .unwrap_or(literal)
}

fn strip_sigil(id: &str) -> &str {
    id.strip_prefix('$')
        .or_else(|| id.strip_prefix('.'))
        .unwrap_or(id)
}

fn unquote(token: &str) -> String {
    let t = token.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

/// Drop one pair of parentheses wrapping the whole expression
fn strip_parens(expr: &str) -> &str {
    let mut current = expr;
    while current.starts_with('(') && current.ends_with(')') {
        let mut depth = 0i32;
        let mut closes_at_end = true;
        for (i, c) in current.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != current.len() - 1 {
                        closes_at_end = false;
                        break;
                    }
                }
                _ => {}
            }
        }
        if !closes_at_end {
            break;
        }
        current = current[1..current.len() - 1].trim();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::Value;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(false)
    }

    #[test]
    fn test_empty_is_true() {
        assert!(evaluate("", &ctx()).unwrap());
        assert!(evaluate("   ", &ctx()).unwrap());
    }

    #[test]
    fn test_variable_equality() {
        let c = ctx();
        c.set_var("x", Value::Bool(true));
        assert!(evaluate("$x == true", &c).unwrap());
        assert!(evaluate("$missing == false", &c).unwrap());
        assert!(!evaluate("$x != true", &c).unwrap());
        c.set_var("env", "prod");
        assert!(evaluate(r#".env == "prod""#, &c).unwrap());
        assert!(evaluate("env == prod", &c).unwrap());
    }

    #[test]
    fn test_numeric_and_logic() {
        let c = ctx();
        assert!(!evaluate("5 > 3 && 2 < 1", &c).unwrap());
        assert!(evaluate("5 > 3 || 2 < 1", &c).unwrap());
        assert!(evaluate("2.5 >= 2", &c).unwrap());
        assert!(evaluate("$missing < 1", &c).unwrap());
        assert!(!evaluate("!true", &c).unwrap());
        assert!(evaluate("!false", &c).unwrap());
    }

    #[test]
    fn test_numeric_with_non_number_fails() {
        let err = evaluate("abc > 1", &ctx()).unwrap_err();
        assert!(matches!(err, RecipeError::UnsupportedCondition(_)));
    }

    #[test]
    fn test_result_suffixes() {
        let c = ctx();
        assert!(!evaluate("op1.success", &c).unwrap());
        assert!(evaluate("op1.failure", &c).unwrap());
        c.set_result("op1", true);
        assert!(evaluate("op1.success", &c).unwrap());
        assert!(!evaluate("$op1.failure", &c).unwrap());
    }

    #[test]
    fn test_template_indirection() {
        let c = ctx();
        c.set_var("count", Value::Int(4));
        assert!(evaluate("{{ .count }} > 3", &c).unwrap());
        c.set_var("cond", "1 < 2");
        assert!(evaluate("{{ .cond }}", &c).unwrap());
        assert!(!evaluate("{{ .nothing }}", &c).unwrap());
    }

    #[test]
    fn test_parenthesised_conjunction() {
        let c = ctx();
        c.set_var("a", "yes");
        assert!(evaluate("($a == yes) && (3 > 2)", &c).unwrap());
        assert!(!evaluate("($a == yes) && (!true)", &c).unwrap());
    }

    #[test]
    fn test_grouped_compound_stays_together() {
        let c = ctx();
        c.set_var("a", Value::Int(1));
        c.set_var("b", Value::Int(2));
        assert!(evaluate("($a == 1 && $b == 2) && (true)", &c).unwrap());
        assert!(!evaluate("($a == 1 && $b == 3) && (true)", &c).unwrap());
        assert!(evaluate("($a == 9 || $b == 2) && ($a < 2)", &c).unwrap());
        assert!(!evaluate("!($a == 1 && $b == 2)", &c).unwrap());
    }

    #[test]
    fn test_unbalanced_group_is_rejected() {
        assert!(matches!(
            evaluate("($a == 1 && true", &ctx()),
            Err(RecipeError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let c = ctx();
        c.set_var("a", Value::Int(9_007_199_254_740_993));
        assert!(evaluate("$a > 9007199254740992", &c).unwrap());
        assert!(!evaluate("$a <= 9007199254740992", &c).unwrap());
        assert!(evaluate("$a >= 1.5", &c).unwrap());
    }

    #[test]
    fn test_numeric_rejects_words_and_non_finite() {
        let c = ctx();
        for text in ["true", "nan", "inf", "infinity", "NaN"] {
            c.set_var("x", text);
            let err = evaluate("$x > 1", &c).unwrap_err();
            assert!(matches!(err, RecipeError::UnsupportedCondition(_)), "{}", text);
        }
        c.set_var("x", Value::Bool(false));
        assert!(evaluate("$x < 1", &c).unwrap());
    }

    #[test]
    fn test_unsupported() {
        assert!(matches!(
            evaluate("maybe", &ctx()),
            Err(RecipeError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_strip_parens_keeps_unbalanced_groups() {
        assert_eq!(strip_parens("(a) && (b)"), "(a) && (b)");
        assert_eq!(strip_parens("((a))"), "a");
    }
}
