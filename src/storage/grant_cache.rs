// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for single-key grant lookups.
//!
//! Fronts the redb `grants` table so repeated `get_or_create` calls for a hot
//! key (team icons on every page load) skip the database read. Entries carry
//! no TTL of their own: the engine checks `expires_at` on every hit.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::grants::Grant;

/// In-process LRU cache keyed by object key.
pub struct GrantCache {
    cache: Mutex<LruCache<String, Grant>>,
}

impl GrantCache {
    /// Create a new cache holding at most `capacity` grants.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<Grant> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(key).cloned()
    }

    pub fn put(&self, grant: Grant) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(grant.key.clone(), grant);
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(key);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}
