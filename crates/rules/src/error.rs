//! Engine error types.
//!
//! Only configuration-time problems surface as errors. Everything that goes
//! wrong while a rule runs becomes a [`RuleResult`](crate::RuleResult).

use thiserror::Error;
use verity_path::PathError;

use crate::rule::RuleId;

/// Errors returned to the caller of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rule id was requested that the repository does not hold.
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),

    /// A rule was registered under an id that is already taken.
    #[error("duplicate rule id: {0}")]
    DuplicateRule(RuleId),

    /// A path could not be parsed or was used where it does not fit.
    #[error("path: {0}")]
    Path(#[from] PathError),

    /// The engine configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker runtime could not be started.
    #[error("runtime: {0}")]
    Runtime(String),
}

/// Misuse of the validation context's rule stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// `leave_rule` was called with nothing on the stack.
    #[error("rule stack is empty")]
    EmptyRuleStack,
}
