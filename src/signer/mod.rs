// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Backend
//!
//! Thin adapter over the object store: produce presigned URLs and delete
//! objects. No caching happens here; the grant engine owns that.

pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use s3::{S3Signer, S3SignerConfig};

/// Largest expiry an S3 presigned URL accepts (7 days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// What the presigned URL lets the holder do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Read,
    Write,
    Delete,
}

impl Operation {
    /// HTTP method the URL is signed for.
    pub fn method(self) -> &'static str {
        match self {
            Operation::Read => "GET",
            Operation::Write => "PUT",
            Operation::Delete => "DELETE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("expiry of {0} seconds is outside the presignable range")]
    ExpiryOutOfRange(u64),

    #[error("object store credentials: {0}")]
    Credentials(String),

    #[error("invalid object store endpoint: {0}")]
    Endpoint(String),

    #[error("object store request failed: {0}")]
    Request(String),

    #[error("object store returned HTTP {status} for {key}")]
    Status { status: u16, key: String },
}

/// Object storage signing operations.
#[async_trait]
pub trait ObjectSigner: Send + Sync {
    /// Presign `operation` on `object_key`, valid for `ttl`.
    async fn sign(
        &self,
        object_key: &str,
        operation: Operation,
        ttl: Duration,
    ) -> Result<String, SignerError>;

    /// Remove the object from the bucket.
    async fn delete_object(&self, object_key: &str) -> Result<(), SignerError>;
}
