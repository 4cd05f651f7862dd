//! Rule execution.
//!
//! Every executor runs the same per-rule algorithm:
//!
//! 1. Cycle check: `(rule, facts)` already on the rule stack fails with
//!    [`Reason::CyclicRuleDependency`] without running anything.
//! 2. `Started` event.
//! 3. Facts-type gate (null facts always pass).
//! 4. Preconditions, in order; the first false one skips the rule.
//! 5. The body. Errors and panics become `FAILED` results.
//! 6. The skipped policy.
//! 7. Leave the rule, publish `Finished`, report. The rule stack is restored
//!    even when a collaborator panics part way through.
//!
//! The executors differ in where that algorithm runs and whether results
//! are memoized per location.

mod cache;
mod concurrent;
mod simple;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use verity_facts::{Facts, Resolved};
use verity_path::Path;

use crate::config::SkippedPolicy;
use crate::context::ValidationContext;
use crate::error::EngineError;
use crate::event::RuleEvent;
use crate::result::{Reason, RuleResult};
use crate::rule::{Outcome, RuleId, RuleRef};
use crate::selector::RuleSelector;

pub use cache::{CacheStats, ResultCache};
pub(crate) use cache::TaskId;
pub use concurrent::ConcurrentRuleExecutor;
pub use simple::SimpleRuleExecutor;

/// Results of the selected rules, in selection order.
pub type Selected = Vec<(RuleId, RuleResult)>;

/// Runs rules against facts within a [`ValidationContext`].
///
/// Only configuration errors (unknown rule ids, bad paths) come back as
/// `Err`; anything that happens while a rule runs is a [`RuleResult`].
pub trait RuleExecutor: Send + Sync + fmt::Debug {
    /// Run `rule` on `facts` and wait for the result.
    fn validate(&self, ctx: &mut ValidationContext, rule: &RuleRef, facts: &Facts) -> RuleResult;

    /// Run `rule` on `facts` against a copy of `ctx`.
    fn validate_async(
        &self,
        ctx: &ValidationContext,
        rule: &RuleRef,
        facts: &Facts,
    ) -> BoxFuture<'static, RuleResult>;

    /// Resolve `path` against `parent` and run `rule` on the value there,
    /// with the path entered for the duration. `None` if nothing is there.
    fn validate_for_path(
        &self,
        ctx: &mut ValidationContext,
        rule: &RuleRef,
        parent: &Facts,
        path: &Path,
    ) -> Result<Option<RuleResult>, EngineError> {
        let Resolved::Present(target) = ctx.resolver().resolve(parent, path)? else {
            return Ok(None);
        };
        let mut scope = ctx.enter_path(parent, path);
        Ok(Some(self.validate(&mut scope, rule, &target)))
    }

    /// [`validate_for_path`](Self::validate_for_path) for each path, in
    /// order. Paths that do not resolve are left out.
    fn validate_for_paths(
        &self,
        ctx: &mut ValidationContext,
        rule: &RuleRef,
        parent: &Facts,
        paths: &[Path],
    ) -> Result<Vec<(Path, RuleResult)>, EngineError> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(result) = self.validate_for_path(ctx, rule, parent, path)? {
                results.push((path.clone(), result));
            }
        }
        Ok(results)
    }

    /// Start `rule` on every resolvable path at once. The future yields
    /// results in `paths` order, whatever order they complete in.
    fn validate_for_paths_async(
        &self,
        ctx: &ValidationContext,
        rule: &RuleRef,
        parent: &Facts,
        paths: &[Path],
    ) -> Result<BoxFuture<'static, Vec<(Path, RuleResult)>>, EngineError> {
        let mut pending = Vec::with_capacity(paths.len());
        for path in paths {
            let Resolved::Present(target) = ctx.resolver().resolve(parent, path)? else {
                continue;
            };
            let mut branch = ctx.copy();
            let scope = branch.enter_path(parent, path);
            let path = path.clone();
            pending.push(
                self.validate_async(&scope, rule, &target)
                    .map(move |result| (path, result))
                    .boxed(),
            );
        }
        Ok(future::join_all(pending).boxed())
    }

    /// Select rules for `facts` and run each in turn.
    fn validate_selected(
        &self,
        ctx: &mut ValidationContext,
        selector: &dyn RuleSelector,
        facts: &Facts,
    ) -> Result<Selected, EngineError> {
        let rules = selector.select_rules(ctx.repository().as_ref(), ctx, facts)?;
        Ok(rules
            .iter()
            .map(|rule| (rule.id().clone(), self.validate(ctx, rule, facts)))
            .collect())
    }

    /// Select rules for `facts` and start them all; results come back in
    /// selection order.
    fn validate_selected_async(
        &self,
        ctx: &ValidationContext,
        selector: &dyn RuleSelector,
        facts: &Facts,
    ) -> Result<BoxFuture<'static, Selected>, EngineError> {
        let rules = selector.select_rules(ctx.repository().as_ref(), ctx, facts)?;
        let pending: Vec<_> = rules
            .iter()
            .map(|rule| {
                let id = rule.id().clone();
                self.validate_async(ctx, rule, facts)
                    .map(move |result| (id, result))
            })
            .collect();
        Ok(future::join_all(pending).boxed())
    }

    /// Resolve `path` against `parent`, then select and run rules on the
    /// value there. Empty if nothing is there.
    fn validate_selected_for_path(
        &self,
        ctx: &mut ValidationContext,
        selector: &dyn RuleSelector,
        parent: &Facts,
        path: &Path,
    ) -> Result<Selected, EngineError> {
        let Resolved::Present(target) = ctx.resolver().resolve(parent, path)? else {
            return Ok(Vec::new());
        };
        let mut scope = ctx.enter_path(parent, path);
        self.validate_selected(&mut scope, selector, &target)
    }

    /// [`validate_selected_async`](Self::validate_selected_async) on every
    /// resolvable path; results in `paths` order.
    fn validate_selected_for_paths_async(
        &self,
        ctx: &ValidationContext,
        selector: &dyn RuleSelector,
        parent: &Facts,
        paths: &[Path],
    ) -> Result<BoxFuture<'static, Vec<(Path, Selected)>>, EngineError> {
        let mut pending = Vec::with_capacity(paths.len());
        for path in paths {
            let Resolved::Present(target) = ctx.resolver().resolve(parent, path)? else {
                continue;
            };
            let mut branch = ctx.copy();
            let scope = branch.enter_path(parent, path);
            let path = path.clone();
            pending.push(
                self.validate_selected_async(&scope, selector, &target)?
                    .map(move |results| (path, results))
                    .boxed(),
            );
        }
        Ok(future::join_all(pending).boxed())
    }
}

/// The per-rule algorithm shared by every executor.
pub(crate) fn run_rule(
    ctx: &mut ValidationContext,
    rule: &RuleRef,
    facts: &Facts,
    skipped: SkippedPolicy,
    source: &str,
) -> RuleResult {
    let started = Instant::now();

    let Some(result) = ctx
        .scope_rule(rule, facts)
        .map(|mut scope| run_entered(&mut scope, rule, facts, skipped, source))
    else {
        return reject_cycle(ctx, rule, facts, source);
    };

    finish(ctx, rule, facts, &result, started, source);
    result
}

/// Steps 2 to 6, with `rule` on the stack.
fn run_entered(
    ctx: &mut ValidationContext,
    rule: &RuleRef,
    facts: &Facts,
    skipped: SkippedPolicy,
    source: &str,
) -> RuleResult {
    tracing::debug!(rule = %rule.id(), depth = ctx.rule_depth(), "entering rule");
    ctx.publisher().publish(
        source,
        &RuleEvent::Started {
            rule_id: rule.id().clone(),
            paths: ctx.path_trail(),
            facts: facts.clone(),
        },
    );

    let result = skipped.apply(gate_and_invoke(ctx, rule, facts));
    tracing::debug!(rule = %rule.id(), %result, "leaving rule");
    result
}

/// Report a refused re-entrant call as a cyclic dependency.
pub(crate) fn reject_cycle(
    ctx: &ValidationContext,
    rule: &RuleRef,
    facts: &Facts,
    source: &str,
) -> RuleResult {
    tracing::warn!(
        rule = %rule.id(),
        path = %ctx.resolver().format(&ctx.current_path()),
        "cyclic rule dependency rejected"
    );
    let result = RuleResult::failed(Reason::CyclicRuleDependency);
    finish(ctx, rule, facts, &result, Instant::now(), source);
    result
}

fn gate_and_invoke(ctx: &mut ValidationContext, rule: &RuleRef, facts: &Facts) -> RuleResult {
    let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
        let expected = rule.facts_type();
        if !expected.accepts(facts) {
            return Ok(RuleResult::skipped(Reason::FactTypeDoesNotMatchRuleType {
                expected: expected.name().to_owned(),
                actual: facts.type_name().to_owned(),
            }));
        }

        if let Some(unmet) = rule
            .preconditions()
            .iter()
            .find(|condition| !condition.evaluate(ctx, facts))
        {
            let description = unmet.describe();
            tracing::debug!(rule = %rule.id(), precondition = %description, "precondition not met");
            return Ok(RuleResult::skipped(Reason::PreconditionNotMet(description)));
        }

        rule.validate(ctx, facts).map(Outcome::into_result)
    }));

    match evaluated {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            tracing::error!(rule = %rule.id(), error = %message, "rule returned an error");
            RuleResult::failed(Reason::RuleExecutionThrowsException(message))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(rule = %rule.id(), %message, "rule panicked");
            RuleResult::failed(Reason::RuleExecutionThrowsException(message))
        }
    }
}

fn finish(
    ctx: &ValidationContext,
    rule: &RuleRef,
    facts: &Facts,
    result: &RuleResult,
    started: Instant,
    source: &str,
) {
    let path = ctx.current_path();
    ctx.publisher().publish(
        source,
        &RuleEvent::Finished {
            rule_id: rule.id().clone(),
            path: path.clone(),
            result: result.clone(),
            elapsed: started.elapsed(),
        },
    );
    ctx.reporter().add(ctx, facts, &path, rule, result);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "rule panicked".to_owned()
    }
}
