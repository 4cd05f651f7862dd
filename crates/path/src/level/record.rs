//! Named properties of domain records.

use verity_facts::{Facts, Resolved};

use super::LevelResolver;

/// Resolves components as property names of facts that expose a
/// [`Record`](verity_facts::Record) view.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordResolver;

impl LevelResolver for RecordResolver {
    fn resolve_level(&self, facts: &Facts, name: &str) -> Resolved<Facts> {
        facts
            .as_record()
            .map_or(Resolved::Absent, |record| record.property(name))
    }

    fn enumerate_level(&self, facts: &Facts) -> Option<Vec<(String, Facts)>> {
        facts.as_record().map(|record| record.properties())
    }
}
