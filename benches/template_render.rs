//! Template rendering benchmarks
//!
//! Measures parse + render cost for the templates recipes use most: plain
//! substitution, pipelines, and range blocks over command output.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sous::engine::condition::evaluate;
use sous::engine::context::ExecutionContext;
use sous::engine::template::render;
use sous::Value;
use std::hint::black_box;

fn context(lines: usize) -> ExecutionContext {
    let ctx = ExecutionContext::new(false);
    ctx.set_var("host", "web-01");
    ctx.set_var("count", Value::Int(42));
    let listing: Vec<String> = (0..lines).map(|i| format!("item-{} ok", i)).collect();
    ctx.set_output("listing", listing.join("\n"));
    ctx
}

fn render_benchmark(c: &mut Criterion) {
    let ctx = context(100);
    let mut group = c.benchmark_group("template_render");

    let cases = [
        ("plain", "ssh deploy@example.com uptime"),
        ("substitution", "ssh deploy@{{ .host }} 'echo {{ .count }}'"),
        ("pipeline", r#"{{ .listing | grep "ok$" | cut " " 1 | lines | len }}"#),
        ("range", "{{ range .listing }}[{{ . }}]{{ end }}"),
        ("arithmetic", "{{ percentf (add .count 8) 200 2 }}"),
    ];

    for (name, template) in cases {
        group.bench_with_input(BenchmarkId::new(name, template.len()), &template, |b, t| {
            b.iter(|| render(black_box(t), &ctx))
        });
    }

    group.finish();
}

fn condition_benchmark(c: &mut Criterion) {
    let ctx = context(10);
    ctx.set_result("build", true);
    let mut group = c.benchmark_group("condition_evaluate");

    for expr in [
        "$host == web-01",
        "$count >= 40 && build.success",
        "{{ gt .count 10 }}",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(expr), &expr, |b, e| {
            b.iter(|| evaluate(black_box(e), &ctx))
        });
    }

    group.finish();
}

fn loop_scaling_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_scaling");
    for lines in [10usize, 100, 1000] {
        let ctx = context(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &ctx, |b, ctx| {
            b.iter(|| render(black_box("{{ range .listing }}{{ . }}\n{{ end }}"), ctx))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    render_benchmark,
    condition_benchmark,
    loop_scaling_benchmark
);
criterion_main!(benches);
