// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OpenAPI document served at `/api/openapi.json`.

use tether_server_api::{
	AuthErrorResponse, CallbackResponse, HealthComponent, HealthResponse, HealthStatus,
	IdentityResponse, LinkAccountRequest, LinkAccountResponse, ProviderInfo, ProvidersResponse,
};
use utoipa::OpenApi;

use crate::routes;

#[derive(OpenApi)]
#[openapi(
	info(
		title = "Tether",
		description = "Multi-tenant OAuth identity-linking broker"
	),
	paths(
		routes::auth::authorize,
		routes::auth::callback,
		routes::auth::link_account,
		routes::auth::list_providers,
		routes::health::health_check,
	),
	components(schemas(
		AuthErrorResponse,
		CallbackResponse,
		HealthComponent,
		HealthResponse,
		HealthStatus,
		IdentityResponse,
		LinkAccountRequest,
		LinkAccountResponse,
		ProviderInfo,
		ProvidersResponse,
	)),
	tags(
		(name = "auth", description = "Login, callback and account linking"),
		(name = "health", description = "Service health")
	)
)]
pub struct ApiDoc;
