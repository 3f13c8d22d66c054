// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded grant database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `grants`: object key → serialized Grant (JSON bytes)
//! - `group_grants`: `owning_group \0 key` → () (group scans)
//! - `group_default_objects`: owning group → default object key
//!
//! redb calls block, so callers run them on the blocking pool.

use std::path::Path;

use redb::{Database, TableDefinition};

use super::StoreResult;

/// Primary table: key → serialized Grant.
pub(crate) const GRANTS: TableDefinition<&str, &[u8]> = TableDefinition::new("grants");

/// Index: `owning_group \0 key` → ().
pub(crate) const GROUP_GRANTS: TableDefinition<&str, ()> = TableDefinition::new("group_grants");

/// Directory: owning group → default object key.
pub(crate) const GROUP_DEFAULT_OBJECTS: TableDefinition<&str, &str> =
    TableDefinition::new("group_default_objects");

/// Separator between group and key in `group_grants`. Never part of a group.
const INDEX_SEPARATOR: char = '\0';

/// Index key for a grant in `group_grants`.
pub(crate) fn group_index_key(owning_group: &str, key: &str) -> String {
    format!("{owning_group}{INDEX_SEPARATOR}{key}")
}

/// Half-open bounds covering every index key of a group.
pub(crate) fn group_index_range(owning_group: &str) -> (String, String) {
    (
        format!("{owning_group}\u{0}"),
        format!("{owning_group}\u{1}"),
    )
}

/// The key half of a `group_grants` entry.
pub(crate) fn key_from_index(index_key: &str) -> Option<&str> {
    index_key
        .split_once(INDEX_SEPARATOR)
        .map(|(_, key)| key)
}

/// Shared handle to the grant database file.
pub struct GrantDatabase {
    db: Database,
}

impl GrantDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(GRANTS)?;
            let _ = write_txn.open_table(GROUP_GRANTS)?;
            let _ = write_txn.open_table(GROUP_DEFAULT_OBJECTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}
