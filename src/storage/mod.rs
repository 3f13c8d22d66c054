// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Grant Storage
//!
//! Persistent table of grants, one row per object key.
//!
//! ## Backends
//!
//! | Backend | Use Case |
//! |---------|----------|
//! | `RedbGrantStore` | Production (embedded redb file under `DATA_DIR`) |
//! | `InMemoryGrantStore` | Tests, ephemeral deployments |
//!
//! Every operation is atomic for the row it touches. Nothing here spans
//! more than one grant, so concurrent callers can only race on the same key,
//! where the last upsert wins.

pub mod database;
pub mod directory_db;
pub mod grant_cache;
pub mod grant_db;
pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::grants::Grant;

pub use database::GrantDatabase;
pub use directory_db::RedbGroupDirectory;
pub use grant_cache::GrantCache;
pub use grant_db::RedbGrantStore;
pub use memory::InMemoryGrantStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Grant table operations.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Look up the grant for an object key.
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<Grant>>;

    /// All grants whose owning group is in `owning_groups`.
    async fn find_by_owning_groups(&self, owning_groups: &BTreeSet<String>)
        -> StoreResult<Vec<Grant>>;

    /// Insert, or refresh `url` + `expires_at` of the row with the same key.
    ///
    /// Returns the row as stored, so an update keeps the original `id`.
    async fn upsert(&self, grant: Grant) -> StoreResult<Grant>;

    /// Remove the group's grants whose key starts with `key_prefix`.
    async fn delete_by_prefix(&self, owning_group: &str, key_prefix: &str) -> StoreResult<usize>;

    /// Remove the group's grant for exactly `key`.
    async fn delete_exact(&self, owning_group: &str, key: &str) -> StoreResult<usize>;

    /// Verify the backing store can be read and written.
    async fn health_check(&self) -> StoreResult<()>;
}
