//! Caller-thread executor.

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use verity_facts::Facts;

use super::{RuleExecutor, run_rule};
use crate::config::SkippedPolicy;
use crate::context::ValidationContext;
use crate::result::RuleResult;
use crate::rule::RuleRef;

const SOURCE: &str = "simple";

/// Runs every rule on the calling thread. The async entry points return
/// futures that are already complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRuleExecutor {
    skipped: SkippedPolicy,
}

impl SimpleRuleExecutor {
    /// Executor keeping `SKIPPED` results as they are.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            skipped: SkippedPolicy::Keep,
        }
    }

    /// Remap `SKIPPED` results with `policy`.
    #[must_use]
    pub const fn with_skipped_policy(mut self, policy: SkippedPolicy) -> Self {
        self.skipped = policy;
        self
    }
}

impl RuleExecutor for SimpleRuleExecutor {
    fn validate(&self, ctx: &mut ValidationContext, rule: &RuleRef, facts: &Facts) -> RuleResult {
        run_rule(ctx, rule, facts, self.skipped, SOURCE)
    }

    fn validate_async(
        &self,
        ctx: &ValidationContext,
        rule: &RuleRef,
        facts: &Facts,
    ) -> BoxFuture<'static, RuleResult> {
        let mut branch = ctx.copy();
        future::ready(self.validate(&mut branch, rule, facts)).boxed()
    }
}
