//! Rule trait and the closure-backed [`SimpleRule`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use verity_facts::{Facts, FactsType};

use crate::condition::Condition;
use crate::context::ValidationContext;
use crate::result::RuleResult;

/// Unique identifier of a rule within a repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Arc<str>);

impl RuleId {
    /// Create a rule id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RuleId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Opaque, ordered key/value annotations on a rule.
pub type RuleMetadata = IndexMap<String, serde_json::Value>;

/// What a rule body hands back to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The body ran to completion.
    Completed(RuleResult),
    /// The body stopped early; the carried result is used verbatim.
    Aborted(RuleResult),
}

impl Outcome {
    /// The result, whichever way the body ended.
    pub fn into_result(self) -> RuleResult {
        match self {
            Self::Completed(result) | Self::Aborted(result) => result,
        }
    }

    /// `true` for [`Outcome::Aborted`].
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

impl From<RuleResult> for Outcome {
    fn from(result: RuleResult) -> Self {
        Self::Completed(result)
    }
}

/// A named, typed check over facts.
///
/// Implementations are immutable once constructed. The executor gates a
/// call to [`validate`](Rule::validate) on [`facts_type`](Rule::facts_type)
/// and [`preconditions`](Rule::preconditions), contains errors and panics
/// from the body, and reports the result.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Repository-unique id.
    fn id(&self) -> &RuleId;

    /// The facts type this rule expects. Null facts always pass.
    fn facts_type(&self) -> FactsType {
        FactsType::any()
    }

    /// Conditions that must all hold before the body runs, in order.
    fn preconditions(&self) -> &[Arc<dyn Condition>] {
        &[]
    }

    /// Free-form annotations.
    fn metadata(&self) -> Option<&RuleMetadata> {
        None
    }

    /// Check `facts`. Sub-rules can be dispatched through `ctx`.
    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> anyhow::Result<Outcome>;
}

/// Shared handle to a rule. Executors and caches use its pointer as the
/// rule's identity.
pub type RuleRef = Arc<dyn Rule>;

pub(crate) fn rule_identity(rule: &RuleRef) -> usize {
    Arc::as_ptr(rule).cast::<()>().addr()
}

/// A rule backed by a closure.
///
/// ```
/// use std::sync::Arc;
/// use verity_facts::FactsType;
/// use verity_rules::{condition, Rule, RuleResult, SimpleRule};
///
/// let rule = SimpleRule::new("positive", |_ctx, facts| {
///     let value = facts.downcast_ref::<i64>().copied().unwrap_or_default();
///     Ok(if value > 0 {
///         RuleResult::ok().into()
///     } else {
///         RuleResult::fail_with("not positive").into()
///     })
/// })
/// .with_facts_type(FactsType::of::<i64>())
/// .with_precondition(condition("not null", |_ctx, facts| !facts.is_null()));
///
/// assert_eq!(rule.id().as_str(), "positive");
/// assert_eq!(rule.preconditions().len(), 1);
/// ```
pub struct SimpleRule<F> {
    id: RuleId,
    facts_type: FactsType,
    preconditions: Vec<Arc<dyn Condition>>,
    metadata: RuleMetadata,
    body: F,
}

impl<F> SimpleRule<F>
where
    F: Fn(&mut ValidationContext, &Facts) -> anyhow::Result<Outcome> + Send + Sync,
{
    /// Rule `id` running `body`; accepts any facts until narrowed.
    pub fn new(id: impl Into<RuleId>, body: F) -> Self {
        Self {
            id: id.into(),
            facts_type: FactsType::any(),
            preconditions: Vec::new(),
            metadata: RuleMetadata::new(),
            body,
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

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Wrap into a [`RuleRef`].
    pub fn into_ref(self) -> RuleRef
    where
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<F> fmt::Debug for SimpleRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleRule")
            .field("id", &self.id)
            .field("facts_type", &self.facts_type)
            .field("preconditions", &self.preconditions.len())
            .finish_non_exhaustive()
    }
}

impl<F> Rule for SimpleRule<F>
where
    F: Fn(&mut ValidationContext, &Facts) -> anyhow::Result<Outcome> + Send + Sync,
{
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn facts_type(&self) -> FactsType {
        self.facts_type
    }

    fn preconditions(&self) -> &[Arc<dyn Condition>] {
        &self.preconditions
    }

    fn metadata(&self) -> Option<&RuleMetadata> {
        Some(&self.metadata)
    }

    fn validate(&self, ctx: &mut ValidationContext, facts: &Facts) -> anyhow::Result<Outcome> {
        (self.body)(ctx, facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Reason;

    #[test]
    fn outcome_collapses_to_result() {
        let aborted = Outcome::Aborted(RuleResult::skipped(Reason::Message("stop".into())));
        assert!(aborted.is_aborted());
        assert!(aborted.into_result().is_skipped());
        let done: Outcome = RuleResult::ok().into();
        assert_eq!(done, Outcome::Completed(RuleResult::ok()));
    }

    #[test]
    fn rule_identity_is_per_instance() {
        let a: RuleRef = SimpleRule::new("same", |_, _| Ok(RuleResult::ok().into())).into_ref();
        let b: RuleRef = SimpleRule::new("same", |_, _| Ok(RuleResult::ok().into())).into_ref();
        assert_eq!(rule_identity(&a), rule_identity(&Arc::clone(&a)));
        assert_ne!(rule_identity(&a), rule_identity(&b));
    }

    #[test]
    fn metadata_is_kept_in_insertion_order() {
        let rule = SimpleRule::new("m", |_, _| Ok(RuleResult::ok().into()))
            .with_metadata("severity", serde_json::json!("high"))
            .with_metadata("owner", serde_json::json!("billing"));
        let keys: Vec<&str> = rule.metadata().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["severity", "owner"]);
    }

    #[test]
    fn rule_id_serializes_as_string() {
        let id = RuleId::new("person.age");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("person.age"));
        assert_eq!(id.to_string(), "person.age");
    }
}
