// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Object Access Grants
//!
//! A grant pairs an object key with a presigned, time-limited URL. Grants are
//! cached in the [`GrantStore`](crate::storage::GrantStore) and handed out by
//! the [`GrantEngine`], which re-signs them once they expire.
//!
//! ## Key Layout
//!
//! ```text
//! {owning_group}/{path...}
//!   acme/icon.png        -> owning group "acme"
//!   acme/boards/1.json   -> owning group "acme"
//!   icon.png             -> invalid (no group segment)
//! ```

pub mod directory;
pub mod engine;
pub mod events;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::signer::{Operation, SignerError};
use crate::storage::StoreError;

pub use directory::{GroupDirectory, InMemoryGroupDirectory};
pub use engine::{GrantEngine, GrantPolicy};
pub use events::{GrantEvent, GrantEventKind};

/// A stored, time-limited permission to operate on one object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Grant {
    /// Storage identity, preserved across revalidation
    pub id: Uuid,
    /// Object key (first path segment is the owning group)
    pub key: String,
    /// Group that owns the object
    pub owning_group: String,
    /// Presigned URL
    pub url: String,
    /// What `url` was signed for
    #[serde(default)]
    pub operation: Operation,
    /// Instant after which `url` must not be used
    pub expires_at: DateTime<Utc>,
    /// When the grant row was first created
    pub created_at: DateTime<Utc>,
}

impl Grant {
    /// Build a fresh grant with a new identity.
    pub fn new(
        key: impl Into<String>,
        owning_group: impl Into<String>,
        url: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            owning_group: owning_group.into(),
            url: url.into(),
            operation: Operation::Read,
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the URL is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Apply an incoming grant for the same key onto this stored row.
    ///
    /// The signed fields (`url`, `operation`, `expires_at`) are taken from
    /// `incoming`. Identity, owning group and creation time belong to the row.
    pub fn refreshed_from(self, incoming: &Grant) -> Self {
        Self {
            url: incoming.url.clone(),
            operation: incoming.operation,
            expires_at: incoming.expires_at,
            ..self
        }
    }
}

/// Error type for grant operations.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("signing backend error: {0}")]
    Backend(#[from] SignerError),

    #[error("grant store error: {0}")]
    Store(#[from] StoreError),

    #[error("grant not found: {0}")]
    NotFound(String),
}

pub type GrantResult<T> = Result<T, GrantError>;

/// Derive the owning group from an object key.
///
/// The group is everything before the first `/`; it must be non-empty and
/// something must follow the separator.
pub fn owning_group_of(key: &str) -> GrantResult<&str> {
    match key.split_once('/') {
        Some((group, rest)) if !group.is_empty() && !rest.is_empty() => Ok(group),
        _ => Err(GrantError::InvalidKey(key.to_string())),
    }
}

/// Strip the file extension from the last path segment of a key.
///
/// `acme/icon.png` and `acme/icon.webp` share the base `acme/icon`, so
/// replacing one removes the grant for the other.
pub fn key_base(key: &str) -> &str {
    let name_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[name_start..].find('.') {
        Some(dot) => &key[..name_start + dot],
        None => key,
    }
}

/// Absolute expiry for a grant signed at `now` with the given TTL.
///
/// Returns `None` when the TTL cannot be represented as a timestamp offset.
pub fn expiry_after(now: DateTime<Utc>, ttl: std::time::Duration) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl).ok()?;
    now.checked_add_signed(ttl)
}
