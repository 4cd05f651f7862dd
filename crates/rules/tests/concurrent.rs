//! Worker-pool executor: memoization, ordering and cycle rejection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use futures::future;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::runtime::Runtime;
use verity_facts::Facts;
use verity_path::Path;
use verity_rules::{
    BroadcastPublisher, CacheStats, ConcurrentRuleExecutor, MemoryReporter, MemoryRuleRepository,
    Reason, ResultCache, ResultCode, RuleEvent, RuleExecutor, RuleId, RuleRef, RuleResult,
    RulesById, SharedExtensions, SimpleRule, ValidationContext,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FAN_OUT: usize = 8;

fn runtime() -> Runtime {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

struct Harness {
    ctx: ValidationContext,
    executor: Arc<ConcurrentRuleExecutor>,
    reporter: Arc<MemoryReporter>,
}

fn harness(rt: &Runtime, repository: MemoryRuleRepository, caching: bool) -> Harness {
    let executor = Arc::new(ConcurrentRuleExecutor::new(rt.handle().clone()).with_caching(caching));
    let reporter = Arc::new(MemoryReporter::new());
    let shared = SharedExtensions::builder()
        .reporter(Arc::clone(&reporter) as _)
        .repository(Arc::new(repository))
        .executor(Arc::clone(&executor) as _)
        .build();
    Harness {
        ctx: ValidationContext::new(shared),
        executor,
        reporter,
    }
}

/// A slow rule counting its invocations.
fn counted_leaf(calls: &Arc<AtomicUsize>) -> RuleRef {
    let calls = Arc::clone(calls);
    SimpleRule::new("leaf", move |_ctx, _facts| {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(RuleResult::ok().into())
    })
    .into_ref()
}

/// Requests `leaf` on its own facts `FAN_OUT` times at once.
fn fan_out() -> RuleRef {
    SimpleRule::new("fan", |ctx, facts| {
        let executor = Arc::clone(ctx.executor());
        let leaf = ctx.repository().get_rule(&RuleId::new("leaf"))?;
        let pending: Vec<_> = (0..FAN_OUT)
            .map(|_| executor.validate_async(ctx, &leaf, facts))
            .collect();
        let results = futures::executor::block_on(future::join_all(pending));
        let merged = results
            .iter()
            .fold(RuleResult::ok(), |merged, result| merged.merge(result));
        Ok(merged.into())
    })
    .into_ref()
}

fn cache_stats(ctx: &ValidationContext) -> Option<CacheStats> {
    ctx.shared()
        .extras()
        .get::<ResultCache>()
        .map(|cache| cache.stats())
}

// ---------------------------------------------------------------------------
// Memoization
// ---------------------------------------------------------------------------

#[test]
fn concurrent_requests_share_one_computation() {
    let rt = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let fan = fan_out();
    let repository = MemoryRuleRepository::new()
        .with_rule(counted_leaf(&calls))
        .unwrap()
        .with_rule(Arc::clone(&fan))
        .unwrap();
    let mut h = harness(&rt, repository, true);

    let result = h.executor.validate(&mut h.ctx, &fan, &Facts::from_json(json!({"k": 1})));

    assert_eq!(result, RuleResult::ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let leaf_entries = h
        .reporter
        .entries()
        .iter()
        .filter(|entry| entry.rule_id.as_str() == "leaf")
        .count();
    assert_eq!(leaf_entries, 1);
    assert_eq!(
        cache_stats(&h.ctx),
        Some(CacheStats {
            locations: 1,
            entries: 2,
            hits: (FAN_OUT - 1) as u64,
            misses: 2,
        })
    );
}

#[test]
fn caching_off_computes_every_request() {
    let rt = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let fan = fan_out();
    let repository = MemoryRuleRepository::new()
        .with_rule(counted_leaf(&calls))
        .unwrap()
        .with_rule(Arc::clone(&fan))
        .unwrap();
    let mut h = harness(&rt, repository, false);

    let result = h.executor.validate(&mut h.ctx, &fan, &Facts::null());

    assert_eq!(result, RuleResult::ok());
    assert_eq!(calls.load(Ordering::SeqCst), FAN_OUT);
    assert_eq!(cache_stats(&h.ctx), None);
}

#[test]
fn distinct_locations_are_computed_separately() {
    let rt = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let leaf = counted_leaf(&calls);
    let repository = MemoryRuleRepository::new().with_rule(Arc::clone(&leaf)).unwrap();
    let h = harness(&rt, repository, true);
    let facts = Facts::from_json(json!({"a": {}, "b": {}}));
    let paths: Vec<Path> = vec!["a".parse().unwrap(), "b".parse().unwrap(), "a".parse().unwrap()];

    let pending = h
        .executor
        .validate_for_paths_async(&h.ctx, &leaf, &facts, &paths)
        .unwrap();
    let results = futures::executor::block_on(pending);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let stats = cache_stats(&h.ctx).unwrap();
    assert_eq!((stats.locations, stats.hits, stats.misses), (2, 1, 2));
}

#[test]
fn path_results_follow_request_order_not_completion_order() {
    let rt = runtime();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let leaf = {
        let completed = Arc::clone(&completed);
        SimpleRule::new("slow-by-value", move |_ctx, facts| {
            let delay = facts.downcast_ref::<i64>().copied().unwrap_or_default();
            thread::sleep(Duration::from_millis(delay.unsigned_abs()));
            completed.lock().push(delay);
            Ok(RuleResult::ok().into())
        })
        .into_ref()
    };
    let repository = MemoryRuleRepository::new().with_rule(Arc::clone(&leaf)).unwrap();
    let h = harness(&rt, repository, true);
    let facts = Facts::from_json(json!({"p1": 120, "p2": 60, "p3": 0}));
    let paths: Vec<Path> = ["p1", "p2", "p3"].iter().map(|p| p.parse().unwrap()).collect();

    let pending = h
        .executor
        .validate_for_paths_async(&h.ctx, &leaf, &facts, &paths)
        .unwrap();
    let results = futures::executor::block_on(pending);

    let returned: Vec<_> = results.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(returned, paths);
    assert_eq!(completed.lock().first(), Some(&0));
}

#[test]
fn equal_values_with_different_identity_are_not_shared() {
    let rt = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let leaf = counted_leaf(&calls);
    let repository = MemoryRuleRepository::new().with_rule(Arc::clone(&leaf)).unwrap();
    let mut h = harness(&rt, repository, true);

    h.executor.validate(&mut h.ctx, &leaf, &Facts::from_json(json!("same")));
    h.executor.validate(&mut h.ctx, &leaf, &Facts::from_json(json!("same")));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn results_follow_request_order_not_completion_order() {
    let rt = runtime();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let mut repository = MemoryRuleRepository::new();
    for (id, delay) in [("p1", 120), ("p2", 60), ("p3", 0)] {
        let completed = Arc::clone(&completed);
        repository
            .add(SimpleRule::new(id, move |_ctx, _facts| {
                thread::sleep(Duration::from_millis(delay));
                completed.lock().push(id);
                Ok(RuleResult::ok().into())
            }))
            .unwrap();
    }
    let h = harness(&rt, repository, true);

    let pending = h
        .executor
        .validate_selected_async(&h.ctx, &RulesById::new(["p1", "p2", "p3"]), &Facts::null())
        .unwrap();
    let results = futures::executor::block_on(pending);

    let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(completed.lock().first(), Some(&"p3"));
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[test]
fn cycle_is_rejected_before_the_cache() {
    let rt = runtime();
    let looping = SimpleRule::new("loop", |ctx, facts| {
        Ok(ctx.validate_rule_id(&RuleId::new("loop"), facts)?.into())
    })
    .into_ref();
    let repository = MemoryRuleRepository::new().with_rule(Arc::clone(&looping)).unwrap();
    let mut h = harness(&rt, repository, true);

    let result = h.executor.validate(&mut h.ctx, &looping, &Facts::from_json(json!([])));

    assert_eq!(result, RuleResult::failed(Reason::CyclicRuleDependency));
    assert_eq!(h.reporter.len(), 2);
    let stats = cache_stats(&h.ctx).unwrap();
    assert_eq!((stats.entries, stats.hits), (1, 0));
}

#[test]
fn mutual_recursion_is_rejected() {
    let rt = runtime();
    let ping = SimpleRule::new("ping", |ctx, facts| {
        Ok(ctx.validate_rule_id(&RuleId::new("pong"), facts)?.into())
    })
    .into_ref();
    let pong = SimpleRule::new("pong", |ctx, facts| {
        Ok(ctx.validate_rule_id(&RuleId::new("ping"), facts)?.into())
    })
    .into_ref();
    let repository = MemoryRuleRepository::new()
        .with_rule(Arc::clone(&ping))
        .unwrap()
        .with_rule(pong)
        .unwrap();
    let mut h = harness(&rt, repository, true);

    let result = h.executor.validate(&mut h.ctx, &ping, &Facts::null());

    assert_eq!(result.code, ResultCode::Failed);
    assert_eq!(result.reason, Some(Reason::CyclicRuleDependency));
}

#[test]
fn selected_rules_dispatching_to_each_other_are_rejected() {
    let rt = runtime();
    let mut repository = MemoryRuleRepository::new();
    for (id, other) in [("x", "y"), ("y", "x")] {
        repository
            .add(SimpleRule::new(id, move |ctx, facts| {
                thread::sleep(Duration::from_millis(50));
                Ok(ctx.validate_rule_id(&RuleId::new(other), facts)?.into())
            }))
            .unwrap();
    }
    let h = harness(&rt, repository, true);

    let pending = h
        .executor
        .validate_selected_async(&h.ctx, &RulesById::new(["x", "y"]), &Facts::from_json(json!({})))
        .unwrap();
    let results = futures::executor::block_on(pending);

    let reasons: Vec<_> = results
        .iter()
        .map(|(id, result)| (id.as_str(), result.reason.clone()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("x", Some(Reason::CyclicRuleDependency)),
            ("y", Some(Reason::CyclicRuleDependency)),
        ]
    );
    // the refused join, then both selected rules
    assert_eq!(h.reporter.len(), 3);
}

// ---------------------------------------------------------------------------
// Containment and events
// ---------------------------------------------------------------------------

#[test]
fn panics_on_workers_become_failed_results() {
    let rt = runtime();
    let rule = SimpleRule::new("panics", |_ctx, _facts| -> anyhow::Result<verity_rules::Outcome> {
        panic!("worker blew up")
    })
    .into_ref();
    let mut h = harness(&rt, MemoryRuleRepository::new(), true);

    let result = h.executor.validate(&mut h.ctx, &rule, &Facts::null());

    assert_eq!(
        result,
        RuleResult::failed(Reason::RuleExecutionThrowsException("worker blew up".into()))
    );
}

#[test]
fn events_carry_the_concurrent_source() {
    let rt = runtime();
    let publisher = Arc::new(BroadcastPublisher::new(16));
    let mut rx = publisher.subscribe();
    let executor = ConcurrentRuleExecutor::new(rt.handle().clone());
    let shared = SharedExtensions::builder()
        .executor(Arc::new(executor.clone()))
        .publisher(publisher)
        .build();
    let mut ctx = ValidationContext::new(shared);
    let rule = SimpleRule::new("a", |_ctx, _facts| Ok(RuleResult::ok().into())).into_ref();

    executor.validate(&mut ctx, &rule, &Facts::null());

    let started = rx.try_recv().unwrap();
    assert_eq!(started.source, "concurrent");
    assert!(matches!(started.event, RuleEvent::Started { .. }));
    let finished = rx.try_recv().unwrap();
    assert!(matches!(finished.event, RuleEvent::Finished { .. }));
}
