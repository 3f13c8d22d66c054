// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! redb-backed grant store.
//!
//! Writes and cache fills are serialized through one lock so the LRU never
//! holds a row the database no longer has. redb already admits a single
//! writer at a time; the lock only adds read misses to that queue. Cache
//! hits and group scans do not take it.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use redb::{ReadableDatabase, ReadableTable};
use tracing::debug;

use super::database::{
    group_index_key, group_index_range, key_from_index, GrantDatabase, GRANTS, GROUP_GRANTS,
};
use super::{GrantCache, GrantStore, StoreError, StoreResult};
use crate::grants::Grant;

/// Default number of grants kept in the read cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Persistent grant store on the embedded database.
#[derive(Clone)]
pub struct RedbGrantStore {
    inner: Arc<Inner>,
}

struct Inner {
    database: Arc<GrantDatabase>,
    cache: GrantCache,
    write_lock: Mutex<()>,
}

impl RedbGrantStore {
    pub fn new(database: Arc<GrantDatabase>, cache_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                database,
                cache: GrantCache::new(cache_capacity),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Run a database closure on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Inner) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner)).await?
    }
}

impl Inner {
    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Poisoned("grant store"))
    }

    fn find_by_key(&self, key: &str) -> StoreResult<Option<Grant>> {
        if let Some(grant) = self.cache.get(key) {
            return Ok(Some(grant));
        }

        let _guard = self.lock()?;
        let read_txn = self.database.db().begin_read()?;
        let table = read_txn.open_table(GRANTS)?;
        let grant: Option<Grant> = match table.get(key)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };

        if let Some(grant) = &grant {
            self.cache.put(grant.clone());
        }
        Ok(grant)
    }

    fn find_by_owning_groups(&self, owning_groups: &BTreeSet<String>) -> StoreResult<Vec<Grant>> {
        let read_txn = self.database.db().begin_read()?;
        let index = read_txn.open_table(GROUP_GRANTS)?;
        let grants = read_txn.open_table(GRANTS)?;

        let mut found = Vec::new();
        for group in owning_groups {
            let (start, end) = group_index_range(group);
            for entry in index.range(start.as_str()..end.as_str())? {
                let (index_key, _) = entry?;
                let index_key = index_key.value();
                let key = key_from_index(index_key).ok_or_else(|| {
                    StoreError::IntegrityViolation(format!("malformed index row {index_key:?}"))
                })?;
                let value = grants.get(key)?.ok_or_else(|| {
                    StoreError::IntegrityViolation(format!("index row for {key} has no grant"))
                })?;
                found.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(found)
    }

    fn upsert(&self, grant: Grant) -> StoreResult<Grant> {
        let _guard = self.lock()?;
        let write_txn = self.database.db().begin_write()?;
        let stored = {
            let mut grants = write_txn.open_table(GRANTS)?;
            let existing: Option<Grant> = match grants.get(grant.key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let stored = match existing {
                Some(row) => row.refreshed_from(&grant),
                None => grant,
            };

            let json = serde_json::to_vec(&stored)?;
            grants.insert(stored.key.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(GROUP_GRANTS)?;
            index.insert(
                group_index_key(&stored.owning_group, &stored.key).as_str(),
                (),
            )?;
            stored
        };
        write_txn.commit()?;

        self.cache.put(stored.clone());
        Ok(stored)
    }

    /// Delete the group's grants whose key satisfies `matches`.
    fn delete_where(&self, owning_group: &str, matches: impl Fn(&str) -> bool) -> StoreResult<usize> {
        let _guard = self.lock()?;
        let write_txn = self.database.db().begin_write()?;
        let removed = {
            let mut index = write_txn.open_table(GROUP_GRANTS)?;
            let (start, end) = group_index_range(owning_group);

            let mut matched = Vec::new();
            for entry in index.range(start.as_str()..end.as_str())? {
                let (index_key, _) = entry?;
                if let Some(key) = key_from_index(index_key.value()) {
                    if matches(key) {
                        matched.push(key.to_string());
                    }
                }
            }

            let mut grants = write_txn.open_table(GRANTS)?;
            for key in &matched {
                index.remove(group_index_key(owning_group, key).as_str())?;
                grants.remove(key.as_str())?;
            }
            matched
        };
        write_txn.commit()?;

        for key in &removed {
            self.cache.invalidate(key);
        }
        Ok(removed.len())
    }

    fn health_check(&self) -> StoreResult<()> {
        {
            let read_txn = self.database.db().begin_read()?;
            let _ = read_txn.open_table(GRANTS)?;
            let _ = read_txn.open_table(GROUP_GRANTS)?;
        }
        let _guard = self.lock()?;
        let write_txn = self.database.db().begin_write()?;
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for RedbGrantStore {
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<Grant>> {
        let key = key.to_string();
        self.blocking(move |inner| inner.find_by_key(&key)).await
    }

    async fn find_by_owning_groups(
        &self,
        owning_groups: &BTreeSet<String>,
    ) -> StoreResult<Vec<Grant>> {
        let owning_groups = owning_groups.clone();
        self.blocking(move |inner| inner.find_by_owning_groups(&owning_groups))
            .await
    }

    async fn upsert(&self, grant: Grant) -> StoreResult<Grant> {
        self.blocking(move |inner| inner.upsert(grant)).await
    }

    async fn delete_by_prefix(&self, owning_group: &str, key_prefix: &str) -> StoreResult<usize> {
        let owning_group = owning_group.to_string();
        let key_prefix = key_prefix.to_string();
        let removed = self
            .blocking(move |inner| {
                inner.delete_where(&owning_group, |key| key.starts_with(&key_prefix))
            })
            .await?;
        debug!(removed, "Deleted grants by prefix");
        Ok(removed)
    }

    async fn delete_exact(&self, owning_group: &str, key: &str) -> StoreResult<usize> {
        let owning_group = owning_group.to_string();
        let key = key.to_string();
        self.blocking(move |inner| inner.delete_where(&owning_group, |candidate| candidate == key))
            .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.blocking(|inner| inner.health_check()).await
    }
}
