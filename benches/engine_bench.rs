#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use microkb::{KnowledgeBase, Rule, Statement};

fn edge(from: usize, to: usize) -> Statement {
    let from = format!("n{from}");
    let to = format!("n{to}");
    Statement::from_symbols("edge", &[from.as_str(), to.as_str()])
}

fn path_rules() -> [Rule; 2] {
    [
        // path(x, y) <- edge(x, y)
        Rule::new(
            [Statement::from_symbols("edge", &["?x", "?y"])],
            Statement::from_symbols("path", &["?x", "?y"]),
        ),
        // path(x, z) <- path(x, y), edge(y, z)
        Rule::new(
            [
                Statement::from_symbols("path", &["?x", "?y"]),
                Statement::from_symbols("edge", &["?y", "?z"]),
            ],
            Statement::from_symbols("path", &["?x", "?z"]),
        ),
    ]
}

/// Benchmark for asserting facts with no rules to chain against
fn bench_assert_facts(c: &mut Criterion) {
    c.bench_function("assert_facts", |b| {
        b.iter(|| {
            let mut kb = KnowledgeBase::new();
            for i in 0..1000 {
                kb.assert(black_box(edge(i, i + 1)))
                    .expect("facts are always accepted");
            }
            black_box(kb)
        });
    });
}

/// Benchmark for a single-antecedent rule over existing facts
fn bench_simple_rule(c: &mut Criterion) {
    c.bench_function("simple_rule", |b| {
        b.iter(|| {
            let mut kb = KnowledgeBase::new();
            for i in 0..100 {
                kb.assert(edge(i, i + 1)).expect("facts are always accepted");
            }
            kb.assert(path_rules()[0].clone()).expect("valid rule");
            black_box(kb.fact_count())
        });
    });
}

/// Benchmark for transitive closure computed by forward chaining
fn bench_transitive_closure(c: &mut Criterion) {
    c.bench_function("transitive_closure", |b| {
        b.iter(|| {
            let mut kb = KnowledgeBase::new();
            for rule in path_rules() {
                kb.assert(rule).expect("valid rule");
            }
            // A linear chain is the worst case for the number of derived paths
            for i in 0..20 {
                kb.assert(edge(i, i + 1)).expect("facts are always accepted");
            }
            black_box(kb.fact_count())
        });
    });
}

/// Benchmark for retracting the root of a chain, which cascades through
/// every derived path
fn bench_retraction_cascade(c: &mut Criterion) {
    c.bench_function("retraction_cascade", |b| {
        b.iter_batched(
            || {
                let mut kb = KnowledgeBase::new();
                for rule in path_rules() {
                    kb.assert(rule).expect("valid rule");
                }
                for i in 0..20 {
                    kb.assert(edge(i, i + 1)).expect("facts are always accepted");
                }
                kb
            },
            |mut kb| {
                kb.retract(edge(0, 1)).expect("edge is stored");
                black_box(kb)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_assert_facts,
    bench_simple_rule,
    bench_transitive_closure,
    bench_retraction_cascade
);
criterion_main!(benches);
