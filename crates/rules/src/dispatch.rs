//! Rules that fan out to other rules and fold the outcomes into one.

use std::fmt;
use std::sync::Arc;

use verity_facts::{Facts, FactsType};
use verity_path::Path;

use crate::condition::Condition;
use crate::context::ValidationContext;
use crate::result::{Reason, RuleResult};
use crate::rule::{Outcome, Rule, RuleId};
use crate::selector::RuleSelector;

/// Fold `results` by severity. Yields `no_match` when there are none.
///
/// A single result comes back unchanged; merging two or more drops the
/// reasons and keeps the most severe code.
pub fn reduce(results: impl IntoIterator<Item = RuleResult>, no_match: RuleResult) -> RuleResult {
    results
        .into_iter()
        .reduce(|merged, next| merged.merge(&next))
        .unwrap_or(no_match)
}

fn default_no_match() -> RuleResult {
    RuleResult::skipped(Reason::NoMatchingRule)
}

/// Runs the rules picked by a selector on the same facts and reduces their
/// results to one.
pub struct DispatchingRule {
    id: RuleId,
    facts_type: FactsType,
    preconditions: Vec<Arc<dyn Condition>>,
    selector: Arc<dyn RuleSelector>,
    no_match: RuleResult,
}

impl DispatchingRule {
    /// Dispatch to `selector`'s rules. With nothing selected the result is
    /// `SKIPPED` / [`Reason::NoMatchingRule`].
    pub fn new(id: impl Into<RuleId>, selector: Arc<dyn RuleSelector>) -> Self {
        Self {
            id: id.into(),
            facts_type: FactsType::any(),
            preconditions: Vec::new(),
            selector,
            no_match: default_no_match(),
        }
    }

    /// Declare the facts type.
    #[must_use]
    pub fn with_facts_type(mut self, facts_type: FactsType) -> Self {
        self.facts_type = facts_type;
        self
    }

    /// Append a precondition.
    #[must_use]
    pub fn with_precondition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.preconditions.push(condition);
        self
    }

    /// Result when the selector picks nothing.
    #[must_use]
    pub fn with_no_match(mut self, result: RuleResult) -> Self {
        self.no_match = result;
        self
    }
}

impl fmt::Debug for DispatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchingRule")
            .field("id", &self.id)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Rule for DispatchingRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn facts_type(&self) -> FactsType {
        self.facts_type
    }

    fn preconditions(&self) -> &[Arc<dyn Condition>] {
        &self.preconditions
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> anyhow::Result<Outcome> {
        let executor = Arc::clone(ctx.executor());
        let pending = executor.validate_selected_async(ctx, self.selector.as_ref(), facts)?;
        let results = futures::executor::block_on(pending);
        Ok(reduce(results.into_iter().map(|(_, result)| result), self.no_match.clone()).into())
    }
}

/// Runs the rules picked by a selector on the sub-objects at a path, or at
/// every match of a pattern, and reduces their results to one.
pub struct ForwardingRule {
    id: RuleId,
    facts_type: FactsType,
    preconditions: Vec<Arc<dyn Condition>>,
    target: Path,
    selector: Arc<dyn RuleSelector>,
    no_match: RuleResult,
}

impl ForwardingRule {
    /// Forward to `selector`'s rules at `target`.
    pub fn new(id: impl Into<RuleId>, target: Path, selector: Arc<dyn RuleSelector>) -> Self {
        Self {
            id: id.into(),
            facts_type: FactsType::any(),
            preconditions: Vec::new(),
            target,
            selector,
            no_match: default_no_match(),
        }
    }

    /// Declare the facts type.
    #[must_use]
    pub fn with_facts_type(mut self, facts_type: FactsType) -> Self {
        self.facts_type = facts_type;
        self
    }

    /// Append a precondition.
    #[must_use]
    pub fn with_precondition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.preconditions.push(condition);
        self
    }

    /// Result when nothing is found at the target or no rule is selected.
    #[must_use]
    pub fn with_no_match(mut self, result: RuleResult) -> Self {
        self.no_match = result;
        self
    }

    /// Where this rule forwards to.
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl fmt::Debug for ForwardingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingRule")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Rule for ForwardingRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn facts_type(&self) -> FactsType {
        self.facts_type
    }

    fn preconditions(&self) -> &[Arc<dyn Condition>] {
        &self.preconditions
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> anyhow::Result<Outcome> {
        let paths = if self.target.is_pattern() {
            ctx.resolver().resolve_pattern(facts, &self.target)
        } else {
            vec![self.target.clone()]
        };
        let executor = Arc::clone(ctx.executor());
        let pending = executor.validate_selected_for_paths_async(
            ctx,
            self.selector.as_ref(),
            facts,
            &paths,
        )?;
        let results = futures::executor::block_on(pending);
        let flattened = results
            .into_iter()
            .flat_map(|(_, selected)| selected.into_iter().map(|(_, result)| result));
        Ok(reduce(flattened, self.no_match.clone()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn reduce_empty_yields_no_match() {
        let reduced = reduce(Vec::new(), RuleResult::skipped(Reason::NoMatchingRule));
        assert_eq!(reduced, RuleResult::skipped(Reason::NoMatchingRule));
    }

    #[test]
    fn reduce_single_keeps_reason() {
        let only = RuleResult::fail_with("bad");
        assert_eq!(reduce([only.clone()], RuleResult::ok()), only);
    }

    #[test]
    fn reduce_many_keeps_worst_and_drops_reason() {
        let reduced = reduce(
            [
                RuleResult::ok(),
                RuleResult::skipped(Reason::NoMatchingRule),
                RuleResult::fail_with("bad"),
                RuleResult::ok(),
            ],
            RuleResult::ok(),
        );
        assert_eq!(reduced.code, ResultCode::Failed);
        assert_eq!(reduced.reason, None);
    }
}
