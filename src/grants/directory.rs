// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Group directory: where a group's default object lives.
//!
//! Teams own their records; the grant engine only asks which object (the
//! team icon, today) should be backfilled when a group has no grant yet.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::storage::{StoreError, StoreResult};

/// Lookup of a group's default object key.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Returns `None` when the group is unknown or has no default object.
    async fn lookup_default_object(&self, owning_group: &str) -> StoreResult<Option<String>>;
}

/// Directory held in memory. Used in tests and by embedders that keep team
/// records elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryGroupDirectory {
    objects: RwLock<HashMap<String, String>>,
}

impl InMemoryGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default_object(&self, owning_group: &str, object_key: &str) -> StoreResult<()> {
        self.objects
            .write()
            .map_err(|_| StoreError::Poisoned("group directory"))?
            .insert(owning_group.to_string(), object_key.to_string());
        Ok(())
    }

    pub fn clear_default_object(&self, owning_group: &str) -> StoreResult<()> {
        self.objects
            .write()
            .map_err(|_| StoreError::Poisoned("group directory"))?
            .remove(owning_group);
        Ok(())
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupDirectory {
    async fn lookup_default_object(&self, owning_group: &str) -> StoreResult<Option<String>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| StoreError::Poisoned("group directory"))?
            .get(owning_group)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_clear_default_object() {
        let directory = InMemoryGroupDirectory::new();
        assert_eq!(directory.lookup_default_object("acme").await.unwrap(), None);

        directory.set_default_object("acme", "acme/icon.png").unwrap();
        assert_eq!(
            directory.lookup_default_object("acme").await.unwrap().as_deref(),
            Some("acme/icon.png")
        );

        directory.clear_default_object("acme").unwrap();
        assert_eq!(directory.lookup_default_object("acme").await.unwrap(), None);
    }
}
