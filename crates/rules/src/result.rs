//! Rule outcomes and severity merging.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome class of a rule. Ordered by severity: `Ok < Skipped < Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// The facts satisfy the rule.
    #[default]
    Ok,
    /// The rule did not apply.
    Skipped,
    /// The facts violate the rule, or the rule could not run.
    Failed,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        })
    }
}

/// Structured explanation attached to a [`RuleResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Reason {
    /// The rule was already running on the same facts further up the stack.
    CyclicRuleDependency,
    /// The facts are not of the type the rule declares.
    FactTypeDoesNotMatchRuleType {
        /// Declared facts type.
        expected: String,
        /// Type of the facts actually supplied.
        actual: String,
    },
    /// A precondition evaluated to false.
    PreconditionNotMet(String),
    /// The rule body returned an error or panicked.
    RuleExecutionThrowsException(String),
    /// A scheduled computation never produced a result.
    ExecutionInterrupted(String),
    /// A dispatch found no rule to run.
    NoMatchingRule,
    /// Free-form message from a rule body.
    Message(String),
    /// Rule-specific payload.
    Custom(serde_json::Value),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CyclicRuleDependency => f.write_str("cyclic rule dependency"),
            Self::FactTypeDoesNotMatchRuleType { expected, actual } => {
                write!(f, "facts of type {actual} do not match rule type {expected}")
            }
            Self::PreconditionNotMet(condition) => write!(f, "precondition not met: {condition}"),
            Self::RuleExecutionThrowsException(message) => write!(f, "rule raised: {message}"),
            Self::ExecutionInterrupted(message) => write!(f, "execution interrupted: {message}"),
            Self::NoMatchingRule => f.write_str("no matching rule"),
            Self::Message(message) => f.write_str(message),
            Self::Custom(value) => write!(f, "{value}"),
        }
    }
}

/// Code plus optional reason.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleResult {
    /// Severity class.
    pub code: ResultCode,
    /// Why the rule ended this way, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl RuleResult {
    /// A passing result without a reason.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: ResultCode::Ok,
            reason: None,
        }
    }

    /// A skipped result.
    #[must_use]
    pub fn skipped(reason: Reason) -> Self {
        Self {
            code: ResultCode::Skipped,
            reason: Some(reason),
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(reason: Reason) -> Self {
        Self {
            code: ResultCode::Failed,
            reason: Some(reason),
        }
    }

    /// Shorthand for a failure with a [`Reason::Message`].
    #[must_use]
    pub fn fail_with(message: impl Into<String>) -> Self {
        Self::failed(Reason::Message(message.into()))
    }

    /// Replace the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// `true` for [`ResultCode::Ok`].
    pub fn is_ok(&self) -> bool {
        self.code == ResultCode::Ok
    }

    /// `true` for [`ResultCode::Skipped`].
    pub fn is_skipped(&self) -> bool {
        self.code == ResultCode::Skipped
    }

    /// `true` for [`ResultCode::Failed`].
    pub fn is_failed(&self) -> bool {
        self.code == ResultCode::Failed
    }

    /// Keep the more severe code of the two. The reason is dropped.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            code: self.code.max(other.code),
            reason: None,
        }
    }
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{} ({reason})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}
