#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Verity Path
//!
//! Structural addressing into facts graphs.
//!
//! - [`Path`] / [`Component`]: immutable address algebra; concrete paths and
//!   wildcard patterns (`*` one level, `**` zero or more levels)
//! - [`PathSyntax`]: configurable separator and wildcard tokens
//! - [`PathResolver`]: resolves concrete paths to values and expands
//!   patterns into the concrete paths present in a given object
//! - [`LevelResolver`]: one-level lookup strategy; the resolver consults an
//!   ordered chain of them ([`CollectionResolver`], then [`RecordResolver`])

pub mod component;
pub mod error;
pub mod level;
mod matching;
pub mod path;
pub mod resolver;
pub mod syntax;

pub use component::Component;
pub use error::PathError;
pub use level::{CollectionResolver, LevelResolver, MissingKeyPolicy, RecordResolver};
pub use path::Path;
pub use resolver::{PathResolver, PathResolverBuilder};
pub use syntax::PathSyntax;
