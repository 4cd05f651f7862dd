//! One-level resolution strategies.
//!
//! A [`PathResolver`](crate::PathResolver) walks a path one component at a
//! time and asks an ordered chain of [`LevelResolver`]s to step into the
//! current value. The first layer that can handle the value wins; the others
//! are consulted only when it reports nothing.

mod collection;
mod record;

use std::fmt;

use verity_facts::{Facts, Resolved};

pub use collection::{CollectionResolver, MissingKeyPolicy};
pub use record::RecordResolver;

/// Steps from a value to its children.
pub trait LevelResolver: Send + Sync + fmt::Debug {
    /// Resolve the child called `name`.
    ///
    /// `Absent` passes the lookup to the next layer in the chain.
    fn resolve_level(&self, facts: &Facts, name: &str) -> Resolved<Facts>;

    /// All `(name, child)` pairs one level below `facts`, in the value's
    /// natural order.
    ///
    /// `None` means this layer cannot enumerate `facts` and the next layer
    /// should be tried; `Some(vec![])` means "no children".
    fn enumerate_level(&self, facts: &Facts) -> Option<Vec<(String, Facts)>>;
}
