// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Grant Reconciliation Engine
//!
//! Hands out presigned URLs that are valid at the moment they are returned,
//! signing as little as possible.
//!
//! ## Operations
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `get_or_create` | cache hit if the stored read grant is unexpired, else re-sign in place |
//! | `get_batch` | revalidate expired grants of the groups, then backfill groups without one |
//! | `update` | drop grants sharing the new key's base, store a fresh upload grant |
//! | `delete` | drop the stored grant, then delete the object |
//!
//! ## Concurrency
//!
//! There is no per-key lock. Two callers missing on the same key both sign
//! and both upsert; the store keeps one row and the last write wins.
//!
//! Within `get_batch` the revalidation phase completes before backfill
//! starts, so backfill sees every group that already has a grant. Work inside
//! each phase runs concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::{GrantEvent, GrantEventKind};
use super::{expiry_after, key_base, owning_group_of, Grant, GrantError, GrantResult, GroupDirectory};
use crate::signer::{ObjectSigner, Operation, SignerError};
use crate::storage::GrantStore;

/// Default TTL of a single-key read grant (7 days).
pub const DEFAULT_READ_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// TTL used when batch reconciliation re-signs or backfills (1 hour).
pub const DEFAULT_REVALIDATION_TTL: Duration = Duration::from_secs(60 * 60);

/// TTL of upload grants issued on object replacement (1 hour).
pub const DEFAULT_WRITE_TTL: Duration = Duration::from_secs(60 * 60);

/// Expiry policy for the grants the engine signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    pub default_ttl: Duration,
    pub revalidation_ttl: Duration,
    pub write_ttl: Duration,
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_READ_TTL,
            revalidation_ttl: DEFAULT_REVALIDATION_TTL,
            write_ttl: DEFAULT_WRITE_TTL,
        }
    }
}

pub struct GrantEngine {
    store: Arc<dyn GrantStore>,
    signer: Arc<dyn ObjectSigner>,
    directory: Arc<dyn GroupDirectory>,
    events: broadcast::Sender<GrantEvent>,
    policy: GrantPolicy,
}

impl GrantEngine {
    pub fn new(
        store: Arc<dyn GrantStore>,
        signer: Arc<dyn ObjectSigner>,
        directory: Arc<dyn GroupDirectory>,
        events: broadcast::Sender<GrantEvent>,
    ) -> Self {
        Self {
            store,
            signer,
            directory,
            events,
            policy: GrantPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: GrantPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> GrantPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    /// Subscribe to grant change events.
    pub fn subscribe(&self) -> broadcast::Receiver<GrantEvent> {
        self.events.subscribe()
    }

    /// Return a valid read grant for `key`, signing one only on miss or expiry.
    ///
    /// `ttl` defaults to the policy's `default_ttl`. A malformed key fails
    /// with [`GrantError::InvalidKey`] before the signer is called.
    pub async fn get_or_create(&self, key: &str, ttl: Option<Duration>) -> GrantResult<Grant> {
        let derived_group = owning_group_of(key)?;
        let ttl = ttl.unwrap_or(self.policy.default_ttl);

        let existing = self.store.find_by_key(key).await?;
        if let Some(grant) = &existing {
            if is_readable(grant) {
                debug!(key = %key, "Grant cache hit");
                return Ok(grant.clone());
            }
        }

        let owning_group = existing
            .as_ref()
            .map_or(derived_group, |grant| grant.owning_group.as_str());
        let fresh = self.sign_grant(key, owning_group, Operation::Read, ttl).await?;
        let stored = self.store.upsert(fresh).await?;

        let kind = if existing.is_some() {
            GrantEventKind::Revalidated
        } else {
            GrantEventKind::Created
        };
        info!(
            key = %key,
            owning_group = %stored.owning_group,
            ttl_secs = ttl.as_secs(),
            event = ?kind,
            "Grant signed"
        );
        self.publish(kind, &stored);
        Ok(stored)
    }

    /// Return the stored read grant for `key` without signing.
    ///
    /// Fails with [`GrantError::NotFound`] when there is no usable grant.
    pub async fn lookup(&self, key: &str) -> GrantResult<Grant> {
        owning_group_of(key)?;
        self.store
            .find_by_key(key)
            .await?
            .filter(is_readable)
            .ok_or_else(|| GrantError::NotFound(key.to_string()))
    }

    /// Valid grants for every group in `owning_groups`.
    ///
    /// Groups with no grant and no default object are skipped. Any signer or
    /// store failure aborts the whole batch.
    pub async fn get_batch(&self, owning_groups: &BTreeSet<String>) -> GrantResult<Vec<Grant>> {
        if owning_groups.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.store.find_by_owning_groups(owning_groups).await?;
        let (mut valid, stale): (Vec<Grant>, Vec<Grant>) =
            stored.into_iter().partition(is_readable);

        let stale_count = stale.len();
        let revalidated = try_join_all(stale.into_iter().map(|grant| self.revalidate(grant))).await?;
        valid.extend(revalidated);

        let missing: Vec<String> = {
            let covered: BTreeSet<&str> = valid.iter().map(|g| g.owning_group.as_str()).collect();
            owning_groups
                .iter()
                .filter(|group| !covered.contains(group.as_str()))
                .cloned()
                .collect()
        };

        let backfilled = try_join_all(missing.iter().map(|group| self.backfill(group))).await?;
        let backfilled_count = backfilled.iter().flatten().count();
        valid.extend(backfilled.into_iter().flatten());

        info!(
            groups = owning_groups.len(),
            returned = valid.len(),
            revalidated = stale_count,
            backfilled = backfilled_count,
            "Grant batch reconciled"
        );
        Ok(valid)
    }

    /// Replace the group's object: drop grants sharing the new key's base and
    /// store a fresh upload grant for `new_key`.
    pub async fn update(&self, owning_group: &str, new_key: &str) -> GrantResult<Grant> {
        if owning_group_of(new_key)? != owning_group {
            return Err(GrantError::InvalidKey(new_key.to_string()));
        }

        let base = key_base(new_key);
        let removed = self.store.delete_by_prefix(owning_group, base).await?;

        let grant = self
            .sign_grant(new_key, owning_group, Operation::Write, self.policy.write_ttl)
            .await?;
        let stored = self.store.upsert(grant).await?;

        info!(
            key = %new_key,
            owning_group = %owning_group,
            removed,
            "Object grant replaced"
        );
        self.publish(GrantEventKind::Replaced, &stored);
        Ok(stored)
    }

    /// Remove the stored grant for `(owning_group, key)`, then delete the
    /// object itself.
    ///
    /// The store deletion stands even if the object delete fails; that
    /// failure is still returned.
    pub async fn delete(&self, owning_group: &str, key: &str) -> GrantResult<bool> {
        if owning_group_of(key)? != owning_group {
            return Err(GrantError::InvalidKey(key.to_string()));
        }

        let removed = self.store.delete_exact(owning_group, key).await?;
        let _ = self
            .events
            .send(GrantEvent::new(GrantEventKind::Deleted, owning_group, key));

        self.signer
            .delete_object(key)
            .await
            .inspect_err(|e| warn!(key = %key, error = %e, "Object delete failed"))?;

        info!(key = %key, owning_group = %owning_group, removed, "Object and grant deleted");
        Ok(true)
    }

    /// Re-sign an unusable grant in place.
    async fn revalidate(&self, grant: Grant) -> GrantResult<Grant> {
        let fresh = self
            .sign_grant(
                &grant.key,
                &grant.owning_group,
                Operation::Read,
                self.policy.revalidation_ttl,
            )
            .await?;
        let stored = self.store.upsert(fresh).await?;
        debug!(key = %stored.key, "Grant revalidated");
        self.publish(GrantEventKind::Revalidated, &stored);
        Ok(stored)
    }

    /// Create a grant for a group's default object, if it has one.
    async fn backfill(&self, owning_group: &str) -> GrantResult<Option<Grant>> {
        let Some(object_key) = self.directory.lookup_default_object(owning_group).await? else {
            debug!(owning_group = %owning_group, "No default object, skipping backfill");
            return Ok(None);
        };
        if owning_group_of(&object_key)? != owning_group {
            return Err(GrantError::InvalidKey(object_key));
        }

        let grant = self
            .sign_grant(
                &object_key,
                owning_group,
                Operation::Read,
                self.policy.revalidation_ttl,
            )
            .await?;
        let stored = self.store.upsert(grant).await?;
        debug!(key = %stored.key, owning_group = %owning_group, "Grant backfilled");
        self.publish(GrantEventKind::Created, &stored);
        Ok(Some(stored))
    }

    async fn sign_grant(
        &self,
        key: &str,
        owning_group: &str,
        operation: Operation,
        ttl: Duration,
    ) -> GrantResult<Grant> {
        // Presigned expiries are whole seconds; the stored expiry must match.
        let ttl = Duration::from_secs(ttl.as_secs());
        // Expiry is taken before signing so it never outlives the URL.
        let expires_at = expiry_after(Utc::now(), ttl)
            .filter(|_| !ttl.is_zero())
            .ok_or(SignerError::ExpiryOutOfRange(ttl.as_secs()))?;

        let url = self
            .signer
            .sign(key, operation, ttl)
            .await
            .inspect_err(|e| warn!(key = %key, operation = ?operation, error = %e, "Signing failed"))?;
        Ok(Grant::new(key, owning_group, url, expires_at).with_operation(operation))
    }

    fn publish(&self, kind: GrantEventKind, grant: &Grant) {
        // No subscribers is fine.
        let _ = self
            .events
            .send(GrantEvent::new(kind, &grant.owning_group, &grant.key));
    }
}

/// A grant the read paths may hand out as-is.
fn is_readable(grant: &Grant) -> bool {
    grant.operation == Operation::Read && grant.is_valid_at(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::events::channel;
    use crate::grants::InMemoryGroupDirectory;
    use crate::storage::InMemoryGrantStore;
    use crate::testing::RecordingSigner;
    use chrono::{DateTime, TimeDelta};

    struct Fixture {
        engine: GrantEngine,
        store: Arc<InMemoryGrantStore>,
        signer: Arc<RecordingSigner>,
        directory: Arc<InMemoryGroupDirectory>,
        events: broadcast::Receiver<GrantEvent>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryGrantStore::new());
        let signer = Arc::new(RecordingSigner::new());
        let directory = Arc::new(InMemoryGroupDirectory::new());
        let (sender, events) = channel(64);
        let engine = GrantEngine::new(
            store.clone(),
            signer.clone(),
            directory.clone(),
            sender,
        );
        Fixture {
            engine,
            store,
            signer,
            directory,
            events,
        }
    }

    fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    async fn store_grant(store: &InMemoryGrantStore, key: &str, expires_at: DateTime<Utc>) -> Grant {
        let group = owning_group_of(key).unwrap();
        store
            .upsert(Grant::new(key, group, format!("https://stored/{key}"), expires_at))
            .await
            .unwrap()
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        let drift = (actual - expected).abs();
        assert!(drift < TimeDelta::seconds(5), "expiry off by {drift}");
    }

    #[tokio::test]
    async fn repeated_get_or_create_hits_cache() {
        let f = fixture();
        let ttl = Some(Duration::from_secs(600));

        let first = f.engine.get_or_create("acme/icon.png", ttl).await.unwrap();
        let second = f.engine.get_or_create("acme/icon.png", ttl).await.unwrap();

        assert_eq!(first.url, second.url);
        assert_eq!(first.id, second.id);
        assert_eq!(f.signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn expired_grant_is_revalidated_in_place() {
        let f = fixture();
        let old = store_grant(&f.store, "acme/icon.png", Utc::now() - TimeDelta::minutes(5)).await;

        let ttl = Duration::from_secs(900);
        let fresh = f.engine.get_or_create("acme/icon.png", Some(ttl)).await.unwrap();

        assert_eq!(fresh.id, old.id);
        assert_ne!(fresh.url, old.url);
        assert_close(fresh.expires_at, Utc::now() + TimeDelta::seconds(900));
        assert!(fresh.expires_at > Utc::now());
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_uses_default_ttl() {
        let f = fixture();
        let grant = f.engine.get_or_create("acme/icon.png", None).await.unwrap();
        assert_close(grant.expires_at, Utc::now() + TimeDelta::days(7));
        assert_eq!(grant.owning_group, "acme");
    }

    #[tokio::test]
    async fn malformed_key_never_reaches_signer() {
        let f = fixture();
        let result = f.engine.get_or_create("icon.png", None).await;

        assert!(matches!(result, Err(GrantError::InvalidKey(_))));
        assert_eq!(f.signer.sign_count(), 0);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected_before_signing() {
        let f = fixture();
        let result = f.engine.get_or_create("acme/icon.png", Some(Duration::ZERO)).await;

        assert!(matches!(
            result,
            Err(GrantError::Backend(SignerError::ExpiryOutOfRange(0)))
        ));
        assert_eq!(f.signer.sign_count(), 0);
    }

    #[tokio::test]
    async fn fractional_ttl_is_truncated_to_whole_seconds() {
        let f = fixture();
        let before = Utc::now();
        let grant = f
            .engine
            .get_or_create("acme/icon.png", Some(Duration::from_millis(1900)))
            .await
            .unwrap();

        assert!(grant.url.contains("ttl=1&"), "{}", grant.url);
        assert!(grant.expires_at >= before + TimeDelta::seconds(1));
        assert!(grant.expires_at < Utc::now() + TimeDelta::milliseconds(1500));

        let result = f
            .engine
            .get_or_create("acme/logo.png", Some(Duration::from_millis(900)))
            .await;
        assert!(matches!(
            result,
            Err(GrantError::Backend(SignerError::ExpiryOutOfRange(0)))
        ));
        assert_eq!(f.signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn signer_failure_propagates_and_leaves_row_untouched() {
        let f = fixture();
        let old = store_grant(&f.store, "acme/icon.png", Utc::now() - TimeDelta::minutes(5)).await;
        f.signer.set_failing(true);

        let result = f.engine.get_or_create("acme/icon.png", None).await;
        assert!(matches!(result, Err(GrantError::Backend(_))));

        let row = f.store.find_by_key("acme/icon.png").await.unwrap().unwrap();
        assert_eq!(row, old);
    }

    #[tokio::test]
    async fn lookup_requires_existing_grant() {
        let f = fixture();
        assert!(matches!(
            f.engine.lookup("acme/icon.png").await,
            Err(GrantError::NotFound(_))
        ));

        store_grant(&f.store, "acme/icon.png", Utc::now() - TimeDelta::minutes(1)).await;
        assert!(matches!(
            f.engine.lookup("acme/icon.png").await,
            Err(GrantError::NotFound(_))
        ));

        let created = f.engine.get_or_create("acme/icon.png", None).await.unwrap();
        assert_eq!(f.engine.lookup("acme/icon.png").await.unwrap(), created);
        assert_eq!(f.signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn batch_keeps_valid_and_backfills_missing_group() {
        let f = fixture();
        let valid = store_grant(&f.store, "acme/icon.png", Utc::now() + TimeDelta::hours(1)).await;
        f.directory.set_default_object("globex", "globex/icon.png").unwrap();

        let mut batch = f.engine.get_batch(&groups(&["acme", "globex"])).await.unwrap();
        batch.sort_by(|a, b| a.owning_group.cmp(&b.owning_group));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], valid);
        assert_eq!(batch[1].owning_group, "globex");
        assert_eq!(batch[1].key, "globex/icon.png");
        assert!(batch.iter().all(|grant| grant.expires_at > Utc::now()));
        assert_eq!(f.signer.sign_count(), 1, "only the backfilled group is signed");
    }

    #[tokio::test]
    async fn batch_skips_group_without_default_object() {
        let f = fixture();
        let batch = f.engine.get_batch(&groups(&["acme"])).await.unwrap();

        assert!(batch.is_empty());
        assert_eq!(f.signer.sign_count(), 0);
    }

    #[tokio::test]
    async fn batch_revalidates_expired_without_backfilling_same_group() {
        let f = fixture();
        let expired = store_grant(&f.store, "acme/icon.png", Utc::now() - TimeDelta::minutes(1)).await;
        f.directory.set_default_object("acme", "acme/other.png").unwrap();

        let batch = f.engine.get_batch(&groups(&["acme"])).await.unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, expired.id);
        assert_close(batch[0].expires_at, Utc::now() + TimeDelta::hours(1));
        assert_eq!(f.signer.sign_count(), 1);
        assert!(f.store.find_by_key("acme/other.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_aborts_on_signer_failure() {
        let f = fixture();
        f.directory.set_default_object("acme", "acme/icon.png").unwrap();
        f.signer.set_failing(true);

        let result = f.engine.get_batch(&groups(&["acme"])).await;
        assert!(matches!(result, Err(GrantError::Backend(_))));
    }

    #[tokio::test]
    async fn batch_rejects_default_object_of_another_group() {
        let f = fixture();
        f.directory.set_default_object("globex", "acme/icon.png").unwrap();

        let result = f.engine.get_batch(&groups(&["globex"])).await;

        assert!(matches!(result, Err(GrantError::InvalidKey(key)) if key == "acme/icon.png"));
        assert_eq!(f.signer.sign_count(), 0);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn batch_with_no_groups_is_empty() {
        let f = fixture();
        assert!(f.engine.get_batch(&BTreeSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_grants_sharing_base() {
        let f = fixture();
        let old_png = store_grant(&f.store, "acme/icon.png", Utc::now() + TimeDelta::hours(1)).await;
        store_grant(&f.store, "acme/icon.webp", Utc::now() + TimeDelta::hours(1)).await;
        store_grant(&f.store, "acme/banner.png", Utc::now() + TimeDelta::hours(1)).await;

        let replaced = f.engine.update("acme", "acme/icon.png").await.unwrap();

        assert_ne!(replaced.id, old_png.id);
        assert_eq!(replaced.operation, Operation::Write);
        assert!(f.store.find_by_key("acme/icon.webp").await.unwrap().is_none());
        assert!(f.store.find_by_key("acme/banner.png").await.unwrap().is_some());

        let icons: Vec<_> = f
            .store
            .find_by_owning_groups(&groups(&["acme"]))
            .await
            .unwrap()
            .into_iter()
            .filter(|grant| grant.key.starts_with("acme/icon"))
            .collect();
        assert_eq!(icons, vec![replaced]);
        assert_eq!(f.signer.signed_operations(), vec![Operation::Write]);
    }

    #[tokio::test]
    async fn update_rejects_key_of_another_group() {
        let f = fixture();
        let result = f.engine.update("acme", "globex/icon.png").await;
        assert!(matches!(result, Err(GrantError::InvalidKey(_))));
        assert_eq!(f.signer.sign_count(), 0);
    }

    #[tokio::test]
    async fn read_after_update_resigns_in_place() {
        let f = fixture();
        let upload = f.engine.update("acme", "acme/icon.png").await.unwrap();
        let read = f.engine.get_or_create("acme/icon.png", None).await.unwrap();

        assert_eq!(read.id, upload.id);
        assert_eq!(read.operation, Operation::Read);
        assert_eq!(
            f.signer.signed_operations(),
            vec![Operation::Write, Operation::Read]
        );
    }

    #[tokio::test]
    async fn delete_removes_grant_and_object() {
        let f = fixture();
        let original = f.engine.get_or_create("acme/icon.png", None).await.unwrap();

        assert!(f.engine.delete("acme", "acme/icon.png").await.unwrap());
        assert!(f.store.find_by_key("acme/icon.png").await.unwrap().is_none());
        assert_eq!(f.signer.deleted_keys(), vec!["acme/icon.png".to_string()]);

        let recreated = f.engine.get_or_create("acme/icon.png", None).await.unwrap();
        assert_ne!(recreated.id, original.id);
    }

    #[tokio::test]
    async fn delete_keeps_store_deletion_when_backend_fails() {
        let f = fixture();
        f.engine.get_or_create("acme/icon.png", None).await.unwrap();
        f.signer.set_failing(true);

        let result = f.engine.delete("acme", "acme/icon.png").await;
        assert!(matches!(result, Err(GrantError::Backend(_))));
        assert!(f.store.find_by_key("acme/icon.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_rejects_key_of_another_group() {
        let f = fixture();
        let acme = f.engine.get_or_create("acme/icon.png", None).await.unwrap();

        let result = f.engine.delete("globex", "acme/icon.png").await;

        assert!(matches!(result, Err(GrantError::InvalidKey(_))));
        assert_eq!(f.store.find_by_key("acme/icon.png").await.unwrap(), Some(acme));
        assert!(f.signer.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn changes_are_published() {
        let mut f = fixture();
        f.engine.get_or_create("acme/icon.png", None).await.unwrap();
        f.engine.update("acme", "acme/icon.webp").await.unwrap();
        f.engine.delete("acme", "acme/icon.webp").await.unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| f.events.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                GrantEventKind::Created,
                GrantEventKind::Replaced,
                GrantEventKind::Deleted
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_misses_leave_one_row() {
        let f = fixture();
        let (a, b) = tokio::join!(
            f.engine.get_or_create("acme/icon.png", None),
            f.engine.get_or_create("acme/icon.png", None)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        assert_eq!(f.store.len(), 1);
    }

    mod redb_backed {
        use super::*;
        use crate::storage::{GrantDatabase, RedbGrantStore};

        struct RedbFixture {
            engine: GrantEngine,
            store: Arc<RedbGrantStore>,
            signer: Arc<RecordingSigner>,
            _dir: tempfile::TempDir,
        }

        fn redb_fixture() -> RedbFixture {
            let dir = tempfile::tempdir().unwrap();
            let database = GrantDatabase::open(&dir.path().join("grants.redb")).unwrap();
            let store = Arc::new(RedbGrantStore::new(Arc::new(database), 16));
            let signer = Arc::new(RecordingSigner::new());
            let (sender, _) = channel(16);
            let engine = GrantEngine::new(
                store.clone(),
                signer.clone(),
                Arc::new(InMemoryGroupDirectory::new()),
                sender,
            );
            RedbFixture {
                engine,
                store,
                signer,
                _dir: dir,
            }
        }

        #[tokio::test]
        async fn repeated_get_or_create_hits_cache() {
            let f = redb_fixture();
            let ttl = Some(Duration::from_secs(600));

            let first = f.engine.get_or_create("acme/icon.png", ttl).await.unwrap();
            let second = f.engine.get_or_create("acme/icon.png", ttl).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(f.signer.sign_count(), 1);
        }

        #[tokio::test]
        async fn expired_grant_is_revalidated_in_place() {
            let f = redb_fixture();
            let old = f
                .store
                .upsert(Grant::new(
                    "acme/icon.png",
                    "acme",
                    "https://stored/acme/icon.png",
                    Utc::now() - TimeDelta::minutes(5),
                ))
                .await
                .unwrap();

            let fresh = f
                .engine
                .get_or_create("acme/icon.png", Some(Duration::from_secs(900)))
                .await
                .unwrap();

            assert_eq!(fresh.id, old.id);
            assert_eq!(fresh.created_at, old.created_at);
            assert_ne!(fresh.url, old.url);
            assert_close(fresh.expires_at, Utc::now() + TimeDelta::seconds(900));

            let rows = f.store.find_by_owning_groups(&groups(&["acme"])).await.unwrap();
            assert_eq!(rows, vec![fresh]);
        }
    }
}
