//! Preconditions gating rule bodies.

use std::fmt;
use std::sync::Arc;

use verity_facts::Facts;

use crate::context::ValidationContext;

/// A boolean predicate evaluated before a rule body runs.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Whether the condition holds for `facts` in `ctx`.
    fn evaluate(&self, ctx: &ValidationContext, facts: &Facts) -> bool;

    /// Description used in [`Reason::PreconditionNotMet`](crate::Reason::PreconditionNotMet).
    fn describe(&self) -> String;
}

/// [`Condition`] backed by a closure. Built by [`condition`].
pub struct FnCondition<F> {
    description: String,
    predicate: F,
}

impl<F> fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> Condition for FnCondition<F>
where
    F: Fn(&ValidationContext, &Facts) -> bool + Send + Sync,
{
    fn evaluate(&self, ctx: &ValidationContext, facts: &Facts) -> bool {
        (self.predicate)(ctx, facts)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Wrap a closure as a shareable precondition.
pub fn condition<F>(description: impl Into<String>, predicate: F) -> Arc<dyn Condition>
where
    F: Fn(&ValidationContext, &Facts) -> bool + Send + Sync + 'static,
{
    Arc::new(FnCondition {
        description: description.into(),
        predicate,
    })
}
