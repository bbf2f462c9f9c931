//! Template resolver tests
//!
//! Tests cover:
//! - trim markers and comments
//! - string, arithmetic and percentage helpers
//! - color helpers honouring the context's color flag
//! - background task helpers against a live context

use sous::engine::context::ExecutionContext;
use sous::engine::template::render;
use sous::{RecipeError, Value};
use std::collections::HashMap;

fn data(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

mod syntax_tests {
    use super::*;

    #[test]
    fn test_trim_markers() {
        let d = data(&[("x", "mid".into())]);
        assert_eq!(render("a   {{- .x -}}   b", &d).unwrap(), "amidb");
        assert_eq!(render("a {{ .x -}}\n\n b", &d).unwrap(), "a midb");
    }

    #[test]
    fn test_comment_produces_nothing() {
        let d = data(&[]);
        assert_eq!(render("x{{/* ignored */}}y", &d).unwrap(), "xy");
    }

    #[test]
    fn test_raw_string_literal() {
        let d = data(&[]);
        assert_eq!(render("{{ `a\\nb` }}", &d).unwrap(), "a\\nb");
    }

    #[test]
    fn test_unclosed_action() {
        let d = data(&[]);
        assert!(matches!(
            render("{{ .x", &d),
            Err(RecipeError::TemplateSyntax(_))
        ));
    }
}

mod function_tests {
    use super::*;

    #[test]
    fn test_string_helpers_compose() {
        let d = data(&[("path", "/srv/app/release.tar.gz".into())]);
        assert_eq!(
            render(r#"{{ .path | trimSuffix ".tar.gz" | trimPrefix "/srv/" }}"#, &d).unwrap(),
            "app/release"
        );
        assert_eq!(
            render(r#"{{ .path | replace "/" ":" }}"#, &d).unwrap(),
            ":srv:app:release.tar.gz"
        );
        assert_eq!(render(r#"{{ hasSuffix ".gz" .path }}"#, &d).unwrap(), "true");
    }

    #[test]
    fn test_grep_and_cut() {
        let d = data(&[("ps", "web 80\ndb 5432\nweb 443".into())]);
        assert_eq!(
            render(r#"{{ .ps | grep "^web" | cut " " 2 }}"#, &d).unwrap(),
            "80\n443"
        );
    }

    #[test]
    fn test_lines_and_len() {
        let d = data(&[("out", "a\n\nb\nc\n".into())]);
        assert_eq!(render("{{ .out | lines | len }}", &d).unwrap(), "3");
    }

    #[test]
    fn test_default() {
        let d = data(&[("set", "value".into())]);
        assert_eq!(render(r#"{{ .unset | default "fallback" }}"#, &d).unwrap(), "fallback");
        assert_eq!(render(r#"{{ .set | default "fallback" }}"#, &d).unwrap(), "value");
    }

    #[test]
    fn test_printf() {
        let d = data(&[("n", Value::Int(7)), ("name", "disk".into())]);
        assert_eq!(
            render(r#"{{ printf "%s at %d%% (%.2f)" .name .n 0.5 }}"#, &d).unwrap(),
            "disk at 7% (0.50)"
        );
    }

    #[test]
    fn test_percentages() {
        let d = data(&[]);
        assert_eq!(render("{{ percent 1 4 }}", &d).unwrap(), "25");
        assert_eq!(render("{{ percentf 1 3 }}", &d).unwrap(), "33.3%");
        assert_eq!(render("{{ percentf 2 3 2 }}", &d).unwrap(), "66.67%");
        assert_eq!(render("{{ percentf 1 0 }}", &d).unwrap(), "0.0%");
    }

    #[test]
    fn test_rounding() {
        let d = data(&[]);
        assert_eq!(render("{{ round 2.567 2 }}", &d).unwrap(), "2.57");
        assert_eq!(render("{{ ceil 1.2 }}", &d).unwrap(), "2");
        assert_eq!(render("{{ floor -1.2 }}", &d).unwrap(), "-2");
        assert_eq!(render("{{ max 3 9 4 }}", &d).unwrap(), "9");
    }

    #[test]
    fn test_division_by_zero() {
        let d = data(&[]);
        assert!(matches!(
            render("{{ div 1 0 }}", &d),
            Err(RecipeError::TemplateExecution(_))
        ));
    }

    #[test]
    fn test_rand_int_bounds() {
        let d = data(&[]);
        for _ in 0..20 {
            let n: i64 = render("{{ randInt 3 5 }}", &d).unwrap().parse().unwrap();
            assert!((3..=5).contains(&n));
        }
        assert_eq!(render("{{ randInt 4 4 }}", &d).unwrap(), "4");
        assert!(render("{{ randInt 5 3 }}", &d).is_err());
    }

    #[test]
    fn test_comparisons() {
        let d = data(&[("n", Value::Int(3))]);
        assert_eq!(render("{{ if gt .n 2 }}big{{ end }}", &d).unwrap(), "big");
        assert_eq!(render(r#"{{ eq .n "3" }}"#, &d).unwrap(), "true");
        assert_eq!(render("{{ and true .missing }}", &d).unwrap(), "false");
    }
}

mod context_tests {
    use super::*;

    #[test]
    fn test_colors_disabled_pass_through() {
        let ctx = ExecutionContext::new(false);
        assert_eq!(render(r#"{{ "ok" | green | bold }}"#, &ctx).unwrap(), "ok");
    }

    #[test]
    fn test_vars_shadow_outputs() {
        let ctx = ExecutionContext::new(false);
        ctx.set_output("build", "from-output");
        assert_eq!(render("{{ .build }}", &ctx).unwrap(), "from-output");
        ctx.set_var("build", "from-var");
        assert_eq!(render("{{ .build }}", &ctx).unwrap(), "from-var");
    }

    #[test]
    fn test_task_helpers() {
        let ctx = ExecutionContext::new(false);
        assert_eq!(render(r#"{{ taskStatus "job" }}"#, &ctx).unwrap(), "unknown");

        let run = ctx.register_task("job", "make");
        assert_eq!(render(r#"{{ taskStatus "job" }}"#, &ctx).unwrap(), "pending");
        assert_eq!(render("{{ tasksPending }}", &ctx).unwrap(), "1");
        assert_eq!(render(r#"{{ taskDone "job" }}"#, &ctx).unwrap(), "false");

        assert!(ctx.finish_task("job", run, Err("boom".into())));
        assert_eq!(render(r#"{{ taskStatus "job" }}"#, &ctx).unwrap(), "failed");
        assert_eq!(render(r#"{{ taskError "job" }}"#, &ctx).unwrap(), "boom");
        assert_eq!(render("{{ tasksPending }}", &ctx).unwrap(), "0");
    }
}
