//! Message-id deduplication using two-set rotation.
//!
//! Maintains a current and previous set. When the current set exceeds the
//! rotation threshold it becomes the previous set and a new empty set is
//! started. Both sets are checked, so an id is remembered for at least
//! `threshold` further insertions and memory stays bounded.

use std::collections::HashSet;
use std::hash::Hash;

/// Default rotation threshold.
pub const DEFAULT_ROTATION_THRESHOLD: usize = 4096;

pub struct MessageIdList<K> {
    current: HashSet<K>,
    prev: HashSet<K>,
    threshold: usize,
}

impl<K: Eq + Hash> MessageIdList<K> {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_ROTATION_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            current: HashSet::new(),
            prev: HashSet::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.current.contains(key) || self.prev.contains(key)
    }

    /// Insert a key and return `true` if it was new.
    pub fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.current.insert(key);
        self.maybe_rotate();
        true
    }

    /// Forget a key so it can be inserted again, e.g. after the message it
    /// names failed and may be resubmitted.
    pub fn remove(&mut self, key: &K) -> bool {
        self.current.remove(key) | self.prev.remove(key)
    }

    fn maybe_rotate(&mut self) {
        if self.current.len() > self.threshold {
            self.prev = std::mem::take(&mut self.current);
        }
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.prev.is_empty()
    }
}

impl<K: Eq + Hash> Default for MessageIdList<K> {
    fn default() -> Self {
        Self::new()
    }
}
