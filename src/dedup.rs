// src/dedup.rs
//! In-memory set of message identities seen during this process lifetime.
//!
//! Nothing is persisted: after a restart previously stored messages can be
//! admitted again. There is no eviction; the set grows with the number of
//! distinct messages seen.

use std::collections::HashSet;

use crate::record::DedupKey;

#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<DedupKey>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `key` is seen, false on every later call.
    pub fn admit(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    /// Forget `key` so a re-delivery is admitted again (used when storing failed).
    pub fn release(&mut self, key: &DedupKey) -> bool {
        self.seen.remove(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
