// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Refresh Scheduler
//!
//! Keeps a consumer's set of grants fresh. It holds the last accepted batch
//! and one deadline: the soonest expiry in that batch plus a small slack.
//! When the deadline passes, it refetches the batch for the current group
//! list.
//!
//! ## Strategy
//!
//! 1. Ignore empty batches and batches that arrive while the group list is
//!    `Loading` or `Failed`.
//! 2. Replace the armed deadline with `min(expires_at) + slack` over the
//!    grants that have not expired yet. No such grant means no deadline.
//! 3. When the deadline fires, or the group list changes to `Ready`, refetch
//!    through the [`BatchSource`] and go back to step 1.
//!
//! A failed refetch is logged and the previous batch is kept. The next group
//! list change retries.
//!
//! ## Shutdown
//!
//! [`RefreshScheduler::run`] owns the only timer. Cancelling its token, or
//! dropping the future, drops the timer with it.

pub mod http;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::grants::{Grant, GrantEngine, GrantError};

pub use http::HttpBatchSource;

/// Delay added after the soonest expiry before refetching.
pub const DEFAULT_SLACK: Duration = Duration::from_secs(1);

/// The consumer's current list of groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupListState {
    Loading,
    Failed(String),
    Ready(BTreeSet<String>),
}

impl GroupListState {
    pub fn ready_groups(&self) -> Option<&BTreeSet<String>> {
        match self {
            GroupListState::Ready(groups) => Some(groups),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error("grant service unreachable: {0}")]
    Transport(String),

    #[error("grant service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

/// Where a scheduler gets fresh batches from.
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn fetch_batch(&self, owning_groups: &BTreeSet<String>) -> Result<Vec<Grant>, FetchError>;
}

#[async_trait]
impl BatchSource for GrantEngine {
    async fn fetch_batch(&self, owning_groups: &BTreeSet<String>) -> Result<Vec<Grant>, FetchError> {
        Ok(self.get_batch(owning_groups).await?)
    }
}

pub struct RefreshScheduler {
    source: Arc<dyn BatchSource>,
    groups: watch::Receiver<GroupListState>,
    grants: watch::Sender<Vec<Grant>>,
    slack: Duration,
    deadline: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn BatchSource>, groups: watch::Receiver<GroupListState>) -> Self {
        let (grants, _) = watch::channel(Vec::new());
        Self {
            source,
            groups,
            grants,
            slack: DEFAULT_SLACK,
            deadline: None,
        }
    }

    pub fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    /// Watch the last accepted batch.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Grant>> {
        self.grants.subscribe()
    }

    /// The last accepted batch.
    pub fn grants(&self) -> Vec<Grant> {
        self.grants.borrow().clone()
    }

    /// When the armed timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Accept a batch and re-arm the timer for it.
    ///
    /// Returns whether the batch was accepted.
    pub fn on_batch(&mut self, batch: Vec<Grant>) -> bool {
        if batch.is_empty() || self.groups.borrow().ready_groups().is_none() {
            debug!(grants = batch.len(), "Batch ignored");
            return false;
        }

        self.deadline = refresh_deadline(&batch, Utc::now(), Instant::now(), self.slack);
        debug!(
            grants = batch.len(),
            armed = self.deadline.is_some(),
            "Batch accepted"
        );
        self.grants.send_replace(batch);
        true
    }

    /// Refetch the batch for the current group list.
    pub async fn refresh(&mut self) {
        let Some(groups) = self.groups.borrow().ready_groups().cloned() else {
            return;
        };

        match self.source.fetch_batch(&groups).await {
            Ok(batch) => {
                self.on_batch(batch);
            }
            Err(e) => {
                warn!(groups = groups.len(), error = %e, "Grant batch refetch failed");
            }
        }
    }

    /// Drive the scheduler until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(scheduler.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(slack_ms = self.slack.as_millis() as u64, "Refresh scheduler starting");

        if self.deadline.is_none() {
            self.refresh().await;
        }

        let mut watching_groups = true;
        loop {
            let deadline = self.deadline;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Refresh scheduler shutting down");
                    return;
                }
                changed = self.groups.changed(), if watching_groups => {
                    if changed.is_err() {
                        debug!("Group list publisher gone, relying on timer");
                        watching_groups = false;
                    } else if self.groups.borrow_and_update().ready_groups().is_some() {
                        self.refresh().await;
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    debug!("Grant refresh timer fired");
                    self.refresh().await;
                }
            }
        }
    }
}

/// When to refetch a batch: the soonest unexpired `expires_at` plus `slack`,
/// mapped from wall-clock time onto the runtime clock.
fn refresh_deadline(
    batch: &[Grant],
    now: DateTime<Utc>,
    now_instant: Instant,
    slack: Duration,
) -> Option<Instant> {
    let soonest = batch
        .iter()
        .map(|grant| grant.expires_at)
        .filter(|expires_at| *expires_at > now)
        .min()?;
    let until = (soonest - now).to_std().ok()?;
    Some(now_instant + until + slack)
}
