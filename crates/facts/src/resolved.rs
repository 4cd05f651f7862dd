//! Absent-vs-present resolution outcome.

/// Outcome of looking something up in a facts graph.
///
/// Unlike `Option`, the present case may itself carry a null value
/// (`Resolved::Present(Facts::null())`), which is not the same thing as the
/// lookup finding nothing. Map lookups rely on this distinction when the
/// missing-key policy reports missing keys as present nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolved<T> {
    /// Nothing was found at the requested location.
    #[default]
    Absent,
    /// A value was found (which may be a null value).
    Present(T),
}

impl<T> Resolved<T> {
    /// Returns `true` if a value was found.
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns `true` if nothing was found.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the contained value.
    pub fn as_ref(&self) -> Resolved<&T> {
        match self {
            Self::Absent => Resolved::Absent,
            Self::Present(value) => Resolved::Present(value),
        }
    }

    /// Map the present value, leaving `Absent` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Self::Absent => Resolved::Absent,
            Self::Present(value) => Resolved::Present(f(value)),
        }
    }

    /// Chain another lookup off the present value.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Resolved<U>) -> Resolved<U> {
        match self {
            Self::Absent => Resolved::Absent,
            Self::Present(value) => f(value),
        }
    }

    /// Fall back to another lookup when absent.
    pub fn or_else(self, f: impl FnOnce() -> Self) -> Self {
        match self {
            Self::Absent => f(),
            present @ Self::Present(_) => present,
        }
    }

    /// Return the present value or `default`.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Absent => default,
            Self::Present(value) => value,
        }
    }

    /// Convert into an `Option`, losing nothing since the null-ness of the
    /// value lives inside `T`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }

    /// `Some(v)` becomes `Present(v)`, `None` becomes `Absent`.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}
