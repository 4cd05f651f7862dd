//! Path error types.

use thiserror::Error;

/// Errors from parsing paths or configuring a resolver.
///
/// These are configuration-time errors: a malformed path or syntax is a
/// programming mistake, not a validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A segment between two separators was empty.
    #[error("empty segment at position {position} in path {input:?}")]
    EmptySegment {
        /// The full input being parsed.
        input: String,
        /// Zero-based segment index.
        position: usize,
    },

    /// A concrete path was required but a pattern was given.
    #[error("path {0:?} is a pattern; a concrete path is required")]
    NotConcrete(String),

    /// The separator/wildcard tokens are unusable.
    #[error("invalid path syntax: {0}")]
    InvalidSyntax(String),
}
