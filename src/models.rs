// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::grants::Grant;
pub use crate::signer::Operation;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BatchGrantsRequest {
    /// Groups whose grants the caller wants
    pub owning_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BatchGrantsResponse {
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ReplaceObjectRequest {
    /// Key of the replacement object, e.g. `acme/icon.webp`
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DeleteObjectResponse {
    pub deleted: bool,
}
