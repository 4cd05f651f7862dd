//! Configurable string form of paths.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::error::PathError;
use crate::path::Path;

/// Separator and wildcard tokens used to read and write paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSyntax {
    /// Token between components. Default `/`.
    pub separator: String,
    /// Token for [`Component::AnyOneLevel`]. Default `*`.
    pub one_level: String,
    /// Token for [`Component::ManyLevels`]. Default `**`.
    pub many_levels: String,
}

impl Default for PathSyntax {
    fn default() -> Self {
        Self {
            separator: "/".into(),
            one_level: "*".into(),
            many_levels: "**".into(),
        }
    }
}

impl PathSyntax {
    /// Syntax with the given tokens, checked with [`PathSyntax::validate`].
    pub fn new(
        separator: impl Into<String>,
        one_level: impl Into<String>,
        many_levels: impl Into<String>,
    ) -> Result<Self, PathError> {
        let syntax = Self {
            separator: separator.into(),
            one_level: one_level.into(),
            many_levels: many_levels.into(),
        };
        syntax.validate()?;
        Ok(syntax)
    }

    /// Reject token combinations that would make parsing ambiguous.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.separator.is_empty() {
            return Err(PathError::InvalidSyntax("separator must not be empty".into()));
        }
        if self.one_level.is_empty() || self.many_levels.is_empty() {
            return Err(PathError::InvalidSyntax(
                "wildcard tokens must not be empty".into(),
            ));
        }
        if self.one_level == self.many_levels {
            return Err(PathError::InvalidSyntax(format!(
                "one-level and many-levels wildcards are both {:?}",
                self.one_level
            )));
        }
        for token in [&self.one_level, &self.many_levels] {
            if token.contains(self.separator.as_str()) {
                return Err(PathError::InvalidSyntax(format!(
                    "wildcard {token:?} contains the separator {:?}",
                    self.separator
                )));
            }
        }
        Ok(())
    }

    /// Parse a path. The empty string is the empty path.
    pub fn parse(&self, input: &str) -> Result<Path, PathError> {
        if input.is_empty() {
            return Ok(Path::empty());
        }
        input
            .split(self.separator.as_str())
            .enumerate()
            .map(|(position, token)| {
                if token.is_empty() {
                    Err(PathError::EmptySegment {
                        input: input.to_owned(),
                        position,
                    })
                } else {
                    Ok(self.classify(token))
                }
            })
            .collect()
    }

    /// Inverse of [`PathSyntax::parse`].
    #[must_use]
    pub fn format(&self, path: &Path) -> String {
        let mut out = String::new();
        for (i, component) in path.components().iter().enumerate() {
            if i > 0 {
                out.push_str(&self.separator);
            }
            out.push_str(self.token(component));
        }
        out
    }

    fn classify(&self, token: &str) -> Component {
        if token == self.many_levels {
            Component::ManyLevels
        } else if token == self.one_level {
            Component::AnyOneLevel
        } else {
            Component::named(token)
        }
    }

    fn token<'a>(&'a self, component: &'a Component) -> &'a str {
        match component {
            Component::Named(name) => name,
            Component::AnyOneLevel => &self.one_level,
            Component::ManyLevels => &self.many_levels,
        }
    }
}
