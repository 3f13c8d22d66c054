// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Group directory stored next to the grants.
//!
//! The team layer records each team's default object (its icon) here;
//! batch reconciliation reads it to backfill grants.

use std::sync::Arc;

use async_trait::async_trait;
use redb::{ReadableDatabase, ReadableTable};

use super::database::{GrantDatabase, GROUP_DEFAULT_OBJECTS};
use super::StoreResult;
use crate::grants::GroupDirectory;

#[derive(Clone)]
pub struct RedbGroupDirectory {
    database: Arc<GrantDatabase>,
}

impl RedbGroupDirectory {
    pub fn new(database: Arc<GrantDatabase>) -> Self {
        Self { database }
    }

    /// Record the group's default object key.
    pub async fn set_default_object(&self, owning_group: &str, object_key: &str) -> StoreResult<()> {
        let database = Arc::clone(&self.database);
        let owning_group = owning_group.to_string();
        let object_key = object_key.to_string();
        tokio::task::spawn_blocking(move || -> StoreResult<_> {
            let write_txn = database.db().begin_write()?;
            {
                let mut table = write_txn.open_table(GROUP_DEFAULT_OBJECTS)?;
                table.insert(owning_group.as_str(), object_key.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await?
    }

    /// Forget the group's default object (team deleted or icon removed).
    pub async fn clear_default_object(&self, owning_group: &str) -> StoreResult<()> {
        let database = Arc::clone(&self.database);
        let owning_group = owning_group.to_string();
        tokio::task::spawn_blocking(move || -> StoreResult<_> {
            let write_txn = database.db().begin_write()?;
            {
                let mut table = write_txn.open_table(GROUP_DEFAULT_OBJECTS)?;
                table.remove(owning_group.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl GroupDirectory for RedbGroupDirectory {
    async fn lookup_default_object(&self, owning_group: &str) -> StoreResult<Option<String>> {
        let database = Arc::clone(&self.database);
        let owning_group = owning_group.to_string();
        tokio::task::spawn_blocking(move || -> StoreResult<_> {
            let read_txn = database.db().begin_read()?;
            let table = read_txn.open_table(GROUP_DEFAULT_OBJECTS)?;
            let object_key = table
                .get(owning_group.as_str())?
                .map(|value| value.value().to_string());
            Ok(object_key)
        })
        .await?
    }
}
