//! Ordered child registries.
//!
//! A [`Registry`] keeps child nodes in registration order so a cascading
//! close visits them oldest first, and removes any one of them in O(1) by
//! [`Key`]. It sits on an unbounded [`LruCache`] that is never touched
//! through the recency-updating accessors, so "least recently used" stays
//! "least recently registered".
//!
//! Keys are tokens drawn from a per-registry counter that never goes back,
//! not even across [`Registry::clear`]. A key kept past its node's close
//! never resolves again.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use lru::LruCache;

/// Key of one value in a [`Registry`].
pub struct Key<T> {
    token: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    fn new(token: u64) -> Self {
        Self {
            token,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.token)
    }
}

/// Ordered set of child nodes addressed by never-reused keys.
pub struct Registry<T> {
    entries: LruCache<u64, T>,
    last_token: u64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            last_token: 0,
        }
    }

    /// Number of registered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a value at the back, returning its key.
    pub fn insert(&mut self, value: T) -> Key<T> {
        self.last_token += 1;
        self.entries.put(self.last_token, value);
        Key::new(self.last_token)
    }

    /// Look up a value.
    pub fn get(&self, key: Key<T>) -> Option<&T> {
        self.entries.peek(&key.token)
    }

    /// Look up a value mutably.
    pub fn get_mut(&mut self, key: Key<T>) -> Option<&mut T> {
        self.entries.peek_mut(&key.token)
    }

    /// Check if `key` refers to a registered value.
    #[must_use]
    pub fn contains(&self, key: Key<T>) -> bool {
        self.entries.contains(&key.token)
    }

    /// Remove a value in O(1).
    pub fn remove(&mut self, key: Key<T>) -> Option<T> {
        self.entries.pop(&key.token)
    }

    /// Remove the oldest registered value.
    pub fn pop_front(&mut self) -> Option<(Key<T>, T)> {
        self.entries
            .pop_lru()
            .map(|(token, value)| (Key::new(token), value))
    }

    /// Iterate values in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter().rev().map(|(_, value)| value)
    }

    /// Iterate values mutably, in registration order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().rev().map(|(_, value)| value)
    }

    /// Remove every value. Keys handed out before the clear stay dead.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
