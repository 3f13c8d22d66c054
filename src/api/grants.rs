// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeSet;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    models::{
        BatchGrantsRequest, BatchGrantsResponse, DeleteObjectResponse, Grant,
        ReplaceObjectRequest,
    },
    signer::MAX_PRESIGN_EXPIRY,
    state::AppState,
};

#[derive(Deserialize, IntoParams)]
pub struct GrantQuery {
    /// Object key, e.g. `acme/icon.png`
    pub key: String,
    /// Requested validity in seconds (defaults to the service's read TTL)
    pub ttl: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct ObjectQuery {
    /// Object key to delete
    pub key: String,
}

#[derive(Deserialize, IntoParams)]
pub struct LookupQuery {
    /// Object key whose stored grant to return
    pub key: String,
}

fn requested_ttl(ttl: Option<u64>) -> Result<Option<Duration>, ApiError> {
    match ttl {
        None => Ok(None),
        Some(secs) if secs > 0 && Duration::from_secs(secs) <= MAX_PRESIGN_EXPIRY => {
            Ok(Some(Duration::from_secs(secs)))
        }
        Some(secs) => Err(ApiError::bad_request(format!(
            "ttl must be between 1 and {} seconds, got {secs}",
            MAX_PRESIGN_EXPIRY.as_secs()
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/grants",
    params(GrantQuery),
    tag = "Grants",
    responses(
        (status = 200, description = "Valid read grant for the key", body = Grant),
        (status = 400, description = "Malformed key or ttl"),
        (status = 502, description = "Object store signing failed")
    )
)]
pub async fn get_grant(
    State(state): State<AppState>,
    Query(params): Query<GrantQuery>,
) -> Result<Json<Grant>, ApiError> {
    let ttl = requested_ttl(params.ttl)?;
    let grant = state.engine.get_or_create(&params.key, ttl).await?;
    Ok(Json(grant))
}

/// Return the stored read grant without signing a new one.
#[utoipa::path(
    get,
    path = "/v1/grants/lookup",
    params(LookupQuery),
    tag = "Grants",
    responses(
        (status = 200, description = "Stored, unexpired read grant", body = Grant),
        (status = 400, description = "Malformed key"),
        (status = 404, description = "No usable grant stored for the key")
    )
)]
pub async fn lookup_grant(
    State(state): State<AppState>,
    Query(params): Query<LookupQuery>,
) -> Result<Json<Grant>, ApiError> {
    let grant = state.engine.lookup(&params.key).await?;
    Ok(Json(grant))
}

#[utoipa::path(
    post,
    path = "/v1/grants/batch",
    request_body = BatchGrantsRequest,
    tag = "Grants",
    responses(
        (status = 200, description = "Valid grants for the requested groups", body = BatchGrantsResponse),
        (status = 502, description = "Object store signing failed")
    )
)]
pub async fn batch_grants(
    State(state): State<AppState>,
    Json(request): Json<BatchGrantsRequest>,
) -> Result<Json<BatchGrantsResponse>, ApiError> {
    let owning_groups: BTreeSet<String> = request.owning_groups.into_iter().collect();
    let grants = state.engine.get_batch(&owning_groups).await?;
    Ok(Json(BatchGrantsResponse { grants }))
}

#[utoipa::path(
    put,
    path = "/v1/groups/{group}/object",
    params(
        ("group" = String, Path, description = "Owning group of the object")
    ),
    request_body = ReplaceObjectRequest,
    tag = "Grants",
    responses(
        (status = 200, description = "Upload grant for the replacement object", body = Grant),
        (status = 400, description = "Key does not belong to the group")
    )
)]
pub async fn replace_object(
    Path(group): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ReplaceObjectRequest>,
) -> Result<Json<Grant>, ApiError> {
    let grant = state.engine.update(&group, &request.object_key).await?;
    Ok(Json(grant))
}

#[utoipa::path(
    delete,
    path = "/v1/groups/{group}/object",
    params(
        ("group" = String, Path, description = "Owning group of the object"),
        ObjectQuery
    ),
    tag = "Grants",
    responses(
        (status = 200, description = "Grant and object removed", body = DeleteObjectResponse),
        (status = 502, description = "Grant removed but the object delete failed")
    )
)]
pub async fn delete_object(
    Path(group): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<ObjectQuery>,
) -> Result<Json<DeleteObjectResponse>, ApiError> {
    let deleted = state.engine.delete(&group, &params.key).await?;
    Ok(Json(DeleteObjectResponse { deleted }))
}
