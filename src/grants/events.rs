// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Change notifications published by the grant engine.
//!
//! The engine is handed the sending half of a broadcast channel at
//! construction; subscribers (websocket fan-out, client schedulers, tests)
//! hold receivers. Lagging receivers lose old events, never block the engine.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default buffer for the grant event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantEventKind {
    /// First grant stored for a key
    Created,
    /// Expired grant re-signed in place
    Revalidated,
    /// Object replaced; older grants under the same base removed
    Replaced,
    /// Grant and object removed
    Deleted,
}

/// A single change to the stored grant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantEvent {
    pub kind: GrantEventKind,
    pub owning_group: String,
    pub key: String,
}

impl GrantEvent {
    pub fn new(kind: GrantEventKind, owning_group: &str, key: &str) -> Self {
        Self {
            kind,
            owning_group: owning_group.to_string(),
            key: key.to_string(),
        }
    }
}

/// Create the channel the engine publishes on.
pub fn channel(capacity: usize) -> (broadcast::Sender<GrantEvent>, broadcast::Receiver<GrantEvent>) {
    broadcast::channel(capacity.max(1))
}
