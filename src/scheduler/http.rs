// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Batch source backed by a remote grant service.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{BatchSource, FetchError};
use crate::grants::Grant;
use crate::models::{BatchGrantsRequest, BatchGrantsResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Fetches batches with `POST {base}/v1/grants/batch`.
#[derive(Debug, Clone)]
pub struct HttpBatchSource {
    client: reqwest::Client,
    batch_url: Url,
}

impl HttpBatchSource {
    pub fn new(base_url: &Url) -> Result<Self, FetchError> {
        let batch_url = base_url
            .join("v1/grants/batch")
            .map_err(|e| FetchError::Transport(format!("invalid base URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client, batch_url })
    }

    pub fn batch_url(&self) -> &Url {
        &self.batch_url
    }
}

#[async_trait]
impl BatchSource for HttpBatchSource {
    async fn fetch_batch(&self, owning_groups: &BTreeSet<String>) -> Result<Vec<Grant>, FetchError> {
        let request = BatchGrantsRequest {
            owning_groups: owning_groups.iter().cloned().collect(),
        };

        let response = self
            .client
            .post(self.batch_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: BatchGrantsResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(body.grants)
    }
}
