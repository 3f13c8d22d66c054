// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Teamboard Grants - Presigned Object Access Grant Service
//!
//! Caches presigned object-storage URLs for team assets, re-signs them when
//! they expire, and reconciles the grants of many teams in one call.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `grants` - Grant model and reconciliation engine
//! - `scheduler` - Client-side refresh of grant batches
//! - `signer` - S3 presigning backend on the AWS SDK
//! - `storage` - Grant store (redb, in-memory)

pub mod api;
pub mod config;
pub mod error;
pub mod grants;
pub mod models;
pub mod scheduler;
pub mod signer;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
