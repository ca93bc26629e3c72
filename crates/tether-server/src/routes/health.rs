// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Health HTTP handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tether_server_api::{HealthResponse, HealthStatus};

use crate::{api::AppState, health};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "System is unhealthy", body = HealthResponse)
    ),
    tag = "health"
)]
/// GET /health - Database reachability and registry counts.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database = health::check_database(&state.pool).await;
	let status = database.status;

	let response = HealthResponse {
		status,
		version: env!("CARGO_PKG_VERSION").to_string(),
		database,
		tenants: state.registry.tenants().count(),
		providers: state.registry.providers().count(),
		adapters: state.providers.len(),
	};

	let http_status = match status {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(response))
}
