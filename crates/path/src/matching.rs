//! Backtracking matcher for wildcard patterns.

use crate::component::Component;

/// Returns `true` if the concrete `subject` is addressed by `pattern`.
///
/// `**` first tries to consume zero subject components and, failing that,
/// grows by one component at a time until the subject is exhausted.
pub(crate) fn matches(subject: &[Component], pattern: &[Component]) -> bool {
    match_from(subject, 0, pattern, 0)
}

fn match_from(subject: &[Component], mut si: usize, pattern: &[Component], mut pi: usize) -> bool {
    while pi < pattern.len() {
        match &pattern[pi] {
            Component::ManyLevels => {
                return (si..=subject.len()).any(|next| match_from(subject, next, pattern, pi + 1));
            }
            Component::AnyOneLevel => {
                if !matches!(subject.get(si), Some(Component::Named(_))) {
                    return false;
                }
            }
            Component::Named(expected) => match subject.get(si) {
                Some(Component::Named(actual)) if actual == expected => {}
                _ => return false,
            },
        }
        si += 1;
        pi += 1;
    }
    si == subject.len()
}
