// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        BatchGrantsRequest, BatchGrantsResponse, DeleteObjectResponse, Grant, Operation,
        ReplaceObjectRequest,
    },
    state::AppState,
};

pub mod grants;
pub mod health;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/grants", get(grants::get_grant))
        .route("/grants/lookup", get(grants::lookup_grant))
        .route("/grants/batch", post(grants::batch_grants))
        .route(
            "/groups/{group}/object",
            put(grants::replace_object).delete(grants::delete_object),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        grants::get_grant,
        grants::lookup_grant,
        grants::batch_grants,
        grants::replace_object,
        grants::delete_object,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Grant,
            Operation,
            BatchGrantsRequest,
            BatchGrantsResponse,
            ReplaceObjectRequest,
            DeleteObjectResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Grants", description = "Presigned object access grants"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
