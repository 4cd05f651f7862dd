//! Path resolution over a chain of level resolvers.

use std::sync::Arc;

use indexmap::IndexSet;
use verity_facts::{Facts, Resolved};

use crate::component::Component;
use crate::error::PathError;
use crate::level::{CollectionResolver, LevelResolver, MissingKeyPolicy, RecordResolver};
use crate::path::Path;
use crate::syntax::PathSyntax;

/// Turns paths into values, and patterns into the concrete paths they
/// address within a given reference object.
///
/// The default chain is [`CollectionResolver`] followed by
/// [`RecordResolver`]: maps and lists first, then record properties.
///
/// ```
/// use serde_json::json;
/// use verity_facts::Facts;
/// use verity_path::PathResolver;
///
/// let resolver = PathResolver::new();
/// let facts = Facts::from_json(json!({"a": {"b": 1, "c": 2}}));
///
/// let b = resolver.resolve_str(&facts, "a/b").unwrap().into_option().unwrap();
/// assert_eq!(b.downcast_ref::<i64>(), Some(&1));
///
/// let paths = resolver.resolve_pattern_str(&facts, "a/*").unwrap();
/// let rendered: Vec<String> = paths.iter().map(|p| resolver.format(p)).collect();
/// assert_eq!(rendered, ["a/b", "a/c"]);
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    syntax: PathSyntax,
    levels: Vec<Arc<dyn LevelResolver>>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    /// Default syntax, absent missing keys, collection then record layers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntax: PathSyntax::default(),
            levels: default_levels(MissingKeyPolicy::Absent),
        }
    }

    /// Start configuring a resolver.
    #[must_use]
    pub fn builder() -> PathResolverBuilder {
        PathResolverBuilder::default()
    }

    /// The string syntax used by [`parse`](Self::parse) and [`format`](Self::format).
    #[must_use]
    pub fn syntax(&self) -> &PathSyntax {
        &self.syntax
    }

    /// Parse with this resolver's syntax.
    pub fn parse(&self, input: &str) -> Result<Path, PathError> {
        self.syntax.parse(input)
    }

    /// Format with this resolver's syntax.
    #[must_use]
    pub fn format(&self, path: &Path) -> String {
        self.syntax.format(path)
    }

    /// Step into `facts` by one named component; the first layer that finds
    /// something wins.
    pub fn resolve_one_level(&self, facts: &Facts, name: &str) -> Resolved<Facts> {
        self.levels
            .iter()
            .map(|level| level.resolve_level(facts, name))
            .find(Resolved::is_present)
            .unwrap_or(Resolved::Absent)
    }

    /// Children of `facts` from the first layer able to enumerate it.
    pub fn enumerate_one_level(&self, facts: &Facts) -> Vec<(String, Facts)> {
        self.levels
            .iter()
            .find_map(|level| level.enumerate_level(facts))
            .unwrap_or_default()
    }

    /// Resolve a concrete path against `facts`.
    ///
    /// The empty path resolves to `facts` itself. Resolution stops at the
    /// first level that cannot be resolved.
    pub fn resolve(&self, facts: &Facts, path: &Path) -> Result<Resolved<Facts>, PathError> {
        path.ensure_concrete()?;
        let mut current = facts.clone();
        for component in path.components() {
            let Some(name) = component.name() else {
                return Err(PathError::NotConcrete(self.format(path)));
            };
            match self.resolve_one_level(&current, name) {
                Resolved::Present(child) => current = child,
                Resolved::Absent => return Ok(Resolved::Absent),
            }
        }
        Ok(Resolved::Present(current))
    }

    /// Parse `path` and resolve it.
    pub fn resolve_str(&self, facts: &Facts, path: &str) -> Result<Resolved<Facts>, PathError> {
        self.resolve(facts, &self.parse(path)?)
    }

    /// Every concrete path within `facts` addressed by `pattern`.
    ///
    /// Paths come out in walk order (the natural enumeration order of each
    /// container, depth first) without duplicates. Each one resolves to a
    /// present value and matches `pattern`. A concrete `pattern` yields
    /// itself when it resolves.
    pub fn resolve_pattern(&self, facts: &Facts, pattern: &Path) -> Vec<Path> {
        let mut walk = PatternWalk {
            resolver: self,
            pattern,
            prefix: Vec::with_capacity(pattern.len()),
            chain: vec![facts.identity()],
            found: IndexSet::new(),
        };
        walk.walk(facts, 0);
        tracing::trace!(
            pattern = %self.format(pattern),
            matches = walk.found.len(),
            "expanded path pattern"
        );
        walk.found.into_iter().collect()
    }

    /// Parse `pattern` and expand it.
    pub fn resolve_pattern_str(
        &self,
        facts: &Facts,
        pattern: &str,
    ) -> Result<Vec<Path>, PathError> {
        Ok(self.resolve_pattern(facts, &self.parse(pattern)?))
    }
}

fn default_levels(missing_key: MissingKeyPolicy) -> Vec<Arc<dyn LevelResolver>> {
    vec![
        Arc::new(CollectionResolver::new(missing_key)),
        Arc::new(RecordResolver),
    ]
}

/// Depth-first generation of the concrete paths a pattern addresses.
struct PatternWalk<'a> {
    resolver: &'a PathResolver,
    pattern: &'a Path,
    prefix: Vec<Component>,
    /// Identities of the values on the current walk, root first.
    chain: Vec<usize>,
    found: IndexSet<Path>,
}

impl PatternWalk<'_> {
    fn walk(&mut self, facts: &Facts, index: usize) {
        let pattern = self.pattern;
        let Some(component) = pattern.components().get(index) else {
            self.emit();
            return;
        };
        match component {
            Component::Named(name) => {
                if let Resolved::Present(child) = self.resolver.resolve_one_level(facts, name) {
                    self.step(Component::Named(Arc::clone(name)), &child, index + 1);
                }
            }
            Component::AnyOneLevel => {
                for (name, child) in self.resolver.enumerate_one_level(facts) {
                    self.descend(Component::named(name), &child, index + 1);
                }
            }
            Component::ManyLevels => {
                // Zero levels consumed, then one more level with `**` still pending.
                self.walk(facts, index + 1);
                for (name, child) in self.resolver.enumerate_one_level(facts) {
                    self.descend(Component::named(name), &child, index);
                }
            }
        }
    }

    /// Wildcard step; refuses to revisit a value already on the walk.
    fn descend(&mut self, component: Component, child: &Facts, index: usize) {
        let identity = child.identity();
        if identity != 0 && self.chain.contains(&identity) {
            tracing::trace!(?component, "skipping cyclic reference during pattern walk");
            return;
        }
        self.step(component, child, index);
    }

    /// Named steps are bounded by the pattern, so they may revisit.
    fn step(&mut self, component: Component, child: &Facts, index: usize) {
        self.prefix.push(component);
        self.chain.push(child.identity());
        self.walk(child, index);
        self.chain.pop();
        self.prefix.pop();
    }

    fn emit(&mut self) {
        let candidate = Path::new(self.prefix.iter().cloned());
        if candidate.matches(self.pattern) {
            self.found.insert(candidate);
        } else {
            tracing::warn!(
                candidate = %self.resolver.format(&candidate),
                pattern = %self.resolver.format(self.pattern),
                "pattern walk produced a path the pattern does not match"
            );
        }
    }
}

/// Builder for [`PathResolver`].
#[derive(Debug, Default)]
pub struct PathResolverBuilder {
    syntax: Option<PathSyntax>,
    missing_key: MissingKeyPolicy,
    skip_defaults: bool,
    extra: Vec<Arc<dyn LevelResolver>>,
}

impl PathResolverBuilder {
    /// Use a custom string syntax.
    #[must_use]
    pub fn syntax(mut self, syntax: PathSyntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Policy for map keys that are not present.
    #[must_use]
    pub fn missing_key(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    /// Append a layer after the built-in ones.
    #[must_use]
    pub fn level(mut self, level: Arc<dyn LevelResolver>) -> Self {
        self.extra.push(level);
        self
    }

    /// Drop the built-in collection and record layers.
    #[must_use]
    pub fn without_default_levels(mut self) -> Self {
        self.skip_defaults = true;
        self
    }

    /// Validate the syntax and assemble the chain.
    pub fn build(self) -> Result<PathResolver, PathError> {
        let syntax = self.syntax.unwrap_or_default();
        syntax.validate()?;

        let mut levels = if self.skip_defaults {
            Vec::new()
        } else {
            default_levels(self.missing_key)
        };
        levels.extend(self.extra);
        if levels.is_empty() {
            return Err(PathError::InvalidSyntax(
                "resolver has no level resolvers".into(),
            ));
        }
        Ok(PathResolver { syntax, levels })
    }
}
