//! Worker-pool executor with per-location memoization.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tokio::runtime::Handle;
use verity_facts::Facts;

use super::cache::{ResultCache, TaskGuard};
use super::{RuleExecutor, reject_cycle, run_rule};
use crate::config::SkippedPolicy;
use crate::context::ValidationContext;
use crate::result::{Reason, RuleResult};
use crate::rule::RuleRef;

const SOURCE: &str = "concurrent";

/// Schedules rule computations on a tokio runtime's blocking pool.
///
/// With caching on, each `(facts, path, rule)` is computed at most once per
/// run: the first request schedules the work and every later or racing
/// request awaits the same shared future. The cache lives in the context's
/// shared registry, so it spans exactly one run.
///
/// A request that would re-enter a rule already on the caller's stack is
/// rejected before the cache is consulted, so it never waits on itself. A
/// request from inside one cached computation for another that is already
/// waiting on it, such as two selected rules dispatching to each other, is
/// rejected the same way instead of joining it.
#[derive(Debug, Clone)]
pub struct ConcurrentRuleExecutor {
    handle: Handle,
    caching: bool,
    skipped: SkippedPolicy,
}

impl ConcurrentRuleExecutor {
    /// Executor scheduling on `handle`, with caching on.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            caching: true,
            skipped: SkippedPolicy::Keep,
        }
    }

    /// Executor on the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Turn memoization on or off.
    #[must_use]
    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    /// Remap `SKIPPED` results with `policy`.
    #[must_use]
    pub fn with_skipped_policy(mut self, policy: SkippedPolicy) -> Self {
        self.skipped = policy;
        self
    }

    /// Whether memoization is on.
    pub fn caching(&self) -> bool {
        self.caching
    }

    fn schedule(
        &self,
        mut branch: ValidationContext,
        rule: RuleRef,
        facts: Facts,
        guard: Option<TaskGuard>,
    ) -> BoxFuture<'static, RuleResult> {
        let skipped = self.skipped;
        let rule_id = rule.id().clone();
        let task = self.handle.spawn_blocking(move || {
            let _guard = guard;
            run_rule(&mut branch, &rule, &facts, skipped, SOURCE)
        });
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::error!(?join_err, rule = %rule_id, "rule computation interrupted");
                    RuleResult::failed(Reason::ExecutionInterrupted(join_err.to_string()))
                }
            }
        }
        .boxed()
    }
}

impl RuleExecutor for ConcurrentRuleExecutor {
    fn validate(&self, ctx: &mut ValidationContext, rule: &RuleRef, facts: &Facts) -> RuleResult {
        futures::executor::block_on(self.validate_async(ctx, rule, facts))
    }

    fn validate_async(
        &self,
        ctx: &ValidationContext,
        rule: &RuleRef,
        facts: &Facts,
    ) -> BoxFuture<'static, RuleResult> {
        if ctx.is_running(rule, facts) {
            // Rejected and reported inline.
            return future::ready(reject_cycle(ctx, rule, facts, SOURCE)).boxed();
        }
        let mut branch = ctx.copy();
        if !self.caching {
            return self.schedule(branch, Arc::clone(rule), facts.clone(), None);
        }

        let cache = ctx.shared().extras().get_or_insert_with(ResultCache::new);
        let path = branch.current_path();
        let waiter = branch.task();
        let pending = cache.get_or_schedule(facts, path, rule, waiter, |task| {
            branch.set_task(task);
            self.schedule(branch, Arc::clone(rule), facts.clone(), Some(cache.guard(task)))
        });
        match pending {
            Some(pending) => pending.boxed(),
            None => future::ready(reject_cycle(ctx, rule, facts, SOURCE)).boxed(),
        }
    }
}
