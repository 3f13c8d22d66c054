// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory grant store (for testing and ephemeral deployments).

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{GrantStore, StoreError, StoreResult};
use crate::grants::Grant;

/// Thread-safe via `RwLock`. Not persistent: data lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    grants: RwLock<HashMap<String, Grant>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grants
    pub fn len(&self) -> usize {
        self.grants.read().map(|grants| grants.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn delete_where(&self, owning_group: &str, matches: impl Fn(&str) -> bool) -> StoreResult<usize> {
        let mut grants = self
            .grants
            .write()
            .map_err(|_| StoreError::Poisoned("grant store"))?;
        let before = grants.len();
        grants.retain(|key, grant| !(grant.owning_group == owning_group && matches(key)));
        Ok(before - grants.len())
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<Grant>> {
        Ok(self
            .grants
            .read()
            .map_err(|_| StoreError::Poisoned("grant store"))?
            .get(key)
            .cloned())
    }

    async fn find_by_owning_groups(
        &self,
        owning_groups: &BTreeSet<String>,
    ) -> StoreResult<Vec<Grant>> {
        Ok(self
            .grants
            .read()
            .map_err(|_| StoreError::Poisoned("grant store"))?
            .values()
            .filter(|grant| owning_groups.contains(&grant.owning_group))
            .cloned()
            .collect())
    }

    async fn upsert(&self, grant: Grant) -> StoreResult<Grant> {
        let mut grants = self
            .grants
            .write()
            .map_err(|_| StoreError::Poisoned("grant store"))?;
        let stored = match grants.remove(&grant.key) {
            Some(row) => row.refreshed_from(&grant),
            None => grant,
        };
        grants.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_by_prefix(&self, owning_group: &str, key_prefix: &str) -> StoreResult<usize> {
        self.delete_where(owning_group, |key| key.starts_with(key_prefix))
    }

    async fn delete_exact(&self, owning_group: &str, key: &str) -> StoreResult<usize> {
        self.delete_where(owning_group, |candidate| candidate == key)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.grants
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::Poisoned("grant store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn grant(key: &str, group: &str) -> Grant {
        Grant::new(key, group, format!("https://{key}"), Utc::now() + TimeDelta::hours(1))
    }

    #[tokio::test]
    async fn upsert_preserves_identity() {
        let store = InMemoryGrantStore::new();
        let first = store.upsert(grant("acme/icon.png", "acme")).await.unwrap();
        let second = store.upsert(grant("acme/icon.png", "acme")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn deletes_are_group_scoped() {
        let store = InMemoryGrantStore::new();
        store.upsert(grant("acme/icon.png", "acme")).await.unwrap();
        store.upsert(grant("acme/icon.webp", "acme")).await.unwrap();
        store.upsert(grant("acme/banner.png", "acme")).await.unwrap();

        assert_eq!(store.delete_by_prefix("globex", "acme/icon").await.unwrap(), 0);
        assert_eq!(store.delete_by_prefix("acme", "acme/icon").await.unwrap(), 2);
        assert_eq!(store.delete_exact("acme", "acme/banner.png").await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn find_by_owning_groups_filters() {
        let store = InMemoryGrantStore::new();
        store.upsert(grant("acme/icon.png", "acme")).await.unwrap();
        store.upsert(grant("globex/icon.png", "globex")).await.unwrap();

        let wanted: BTreeSet<String> = ["acme".to_string()].into();
        let found = store.find_by_owning_groups(&wanted).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owning_group, "acme");
    }
}
