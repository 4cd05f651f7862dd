// Rule execution overhead.
//
// Trivial rule bodies, so the numbers measure gating, the stacks, event
// publication and (for the concurrent executor) the result cache and the
// blocking-pool hop.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use verity_facts::Facts;
use verity_rules::{
    AllRules, EngineConfig, ExecutionMode, MemoryRuleRepository, RuleExecutor, RuleResult,
    SharedExtensions, SimpleRule, SimpleRuleExecutor, ValidationContext, Validator,
};

fn repository(rules: usize) -> MemoryRuleRepository {
    let mut repository = MemoryRuleRepository::new();
    for i in 0..rules {
        repository
            .add(SimpleRule::new(format!("rule-{i}"), |_ctx, facts| {
                Ok(if facts.is_null() {
                    RuleResult::fail_with("null")
                } else {
                    RuleResult::ok()
                }
                .into())
            }))
            .expect("unique ids");
    }
    repository
}

fn single_rule(c: &mut Criterion) {
    let rule = SimpleRule::new("noop", |_ctx, _facts| Ok(RuleResult::ok().into())).into_ref();
    let executor = SimpleRuleExecutor::new();
    let mut ctx = ValidationContext::new(SharedExtensions::builder().build());
    let facts = Facts::from_json(json!({"a": 1}));

    c.bench_function("simple_single_rule", |b| {
        b.iter(|| black_box(executor.validate(&mut ctx, &rule, &facts)));
    });
}

fn validator_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator");
    let facts = Facts::from_json(json!({"items": [1, 2, 3]}));

    for rules in [10_usize, 100] {
        for mode in [ExecutionMode::Sequential, ExecutionMode::Concurrent] {
            let validator = Validator::builder(repository(rules))
                .config(EngineConfig {
                    mode,
                    worker_threads: Some(2),
                    ..EngineConfig::default()
                })
                .build()
                .expect("valid config");
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}").to_lowercase(), rules),
                &rules,
                |b, _| {
                    b.iter(|| {
                        black_box(validator.validate(&facts, &AllRules).expect("known rules"))
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, single_rule, validator_modes);
criterion_main!(benches);
