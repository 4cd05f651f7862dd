#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Verity Facts
//!
//! The data model validated by the Verity engine: an arbitrary graph of
//! shared values ("facts") addressed by structural paths.
//!
//! - [`Facts`]: cheap-clone, identity-comparable handle to a value, or null
//! - [`Fact`]: implemented by every type that can live in the graph
//! - [`Record`]: named-property access for domain types
//! - [`Resolved`]: lookup outcome that keeps "absent" apart from "present null"
//! - [`FactsType`]: the runtime type a rule declares it validates

pub mod fact;
pub mod facts;
pub mod facts_type;
pub mod resolved;

pub use fact::{Fact, FactList, FactMap, Record};
pub use facts::Facts;
pub use facts_type::FactsType;
pub use resolved::Resolved;
