//! Shared dedup set for detail URLs

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Set of dedup keys already scheduled during a run
///
/// Membership check and insertion happen under one lock, so two sections that
/// discover the same detail page concurrently schedule it once.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key`, returning true if it was not present before
    pub fn insert(&self, key: impl Into<String>) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into())
    }
}
