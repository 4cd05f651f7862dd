//! Persistent stack with structural sharing.
//!
//! `push` returns a new stack whose tail is the old one; nothing is ever
//! mutated in place, so copies held by concurrent branches read their
//! ancestor chain without locking.

use std::fmt;
use std::sync::Arc;

struct Node<T> {
    value: T,
    next: Option<Arc<Node<T>>>,
}

/// Immutable singly linked stack.
pub struct PersistentStack<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

impl<T> PersistentStack<T> {
    /// The empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// A stack with `value` on top of `self`.
    #[must_use]
    pub fn push(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The stack below the top, or `None` when empty.
    #[must_use]
    pub fn pop(&self) -> Option<Self> {
        let head = self.head.as_ref()?;
        Some(Self {
            head: head.next.clone(),
            len: self.len - 1,
        })
    }

    /// Top value.
    pub fn peek(&self) -> Option<&T> {
        self.head.as_deref().map(|node| &node.value)
    }

    /// Bottom value: the first one pushed onto an empty stack.
    pub fn bottom(&self) -> Option<&T> {
        self.iter().last()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the stack holds nothing.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Values from top to bottom.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
        }
    }
}

impl<T> Default for PersistentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PersistentStack<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// Unlink iteratively so long stacks do not overflow on drop.
impl<T> Drop for PersistentStack<T> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Iterator over a [`PersistentStack`], top first.
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(&node.value)
    }
}

impl<'a, T> IntoIterator for &'a PersistentStack<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
