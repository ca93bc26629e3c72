// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authorize, callback and link-account handlers.

use axum::{
	extract::{rejection::JsonRejection, Path, Query, State},
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use tether_server_api::{
	AuthErrorResponse, AuthorizeQuery, CallbackResponse, LinkAccountRequest, LinkAccountResponse,
	ProviderInfo, ProvidersResponse,
};

use crate::{
	api::AppState,
	error::{FlowError, ServerError},
	flow::FlowState,
};

#[utoipa::path(
    get,
    path = "/auth/authorize/{provider_id}",
    params(
        ("provider_id" = String, Path, description = "Identity provider id"),
        AuthorizeQuery
    ),
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 400, description = "Unknown app, role mismatch or unsupported provider", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
/// GET /auth/authorize/{provider_id} - Start a login with an identity provider.
///
/// Every query parameter except `provider` is carried onto the callback URL.
/// Keys the provider appends to its response (`state`, `code`, ...) are refused.
pub async fn authorize(
	State(state): State<AppState>,
	Path(provider_id): Path<String>,
	Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ServerError> {
	match state
		.flow
		.run(FlowState::AuthorizeRequested { provider_id, query })
		.await?
	{
		FlowState::ProviderRedirected { location } => {
			Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
		}
		other => Err(unexpected(&other)),
	}
}

#[utoipa::path(
    get,
    path = "/auth/callback/{provider_id}",
    params(
        ("provider_id" = String, Path, description = "Identity provider id"),
        ("code" = String, Query, description = "Authorization code"),
        ("appId" = String, Query, description = "Tenant id forwarded from authorize")
    ),
    responses(
        (status = 200, description = "Identity resolved", body = CallbackResponse),
        (status = 400, description = "Invalid request", body = AuthErrorResponse),
        (status = 502, description = "Provider exchange failed", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
/// GET /auth/callback/{provider_id} - Complete the provider exchange.
///
/// Linked identities get a token straight away; unlinked ones get the
/// tenant's link fields and a link ticket.
pub async fn callback(
	State(state): State<AppState>,
	Path(provider_id): Path<String>,
	Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<CallbackResponse>, ServerError> {
	let terminal = state
		.flow
		.run(FlowState::CallbackReceived { provider_id, query })
		.await?;

	let response = match terminal {
		FlowState::LinkingRequired {
			tenant,
			identity,
			link_ticket,
		} => CallbackResponse {
			user: identity.into(),
			linked: false,
			link_fields: tenant.link_fields.clone(),
			token: None,
			redirect_url: None,
			link_ticket: Some(link_ticket),
		},
		FlowState::Complete {
			tenant,
			identity,
			token,
			redirect_url,
		} => CallbackResponse {
			user: identity.into(),
			linked: true,
			link_fields: tenant.link_fields.clone(),
			token: token.map(|t| t.into_inner()),
			redirect_url,
			link_ticket: None,
		},
		other => return Err(unexpected(&other)),
	};
	Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/auth/link-account",
    request_body = LinkAccountRequest,
    responses(
        (status = 200, description = "Identity linked", body = LinkAccountResponse),
        (status = 400, description = "Invalid request, credentials or link ticket", body = AuthErrorResponse),
        (status = 403, description = "Account belongs to another client", body = AuthErrorResponse),
        (status = 404, description = "No matching account", body = AuthErrorResponse),
        (status = 502, description = "Account system failure", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
/// POST /auth/link-account - Link a provider identity to a tenant account.
pub async fn link_account(
	State(state): State<AppState>,
	body: Result<Json<LinkAccountRequest>, JsonRejection>,
) -> Result<Json<LinkAccountResponse>, ServerError> {
	let Json(request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

	let terminal = state
		.flow
		.run(FlowState::LinkRequested {
			provider_id: request.provider_id,
			app_id: request.app_id,
			payload: request.payload,
			link_ticket: request.link_ticket,
		})
		.await?;

	match terminal {
		FlowState::Complete {
			token,
			redirect_url,
			..
		} => Ok(Json(LinkAccountResponse {
			linked: true,
			redirect_url,
			token: token.map(|t| t.into_inner()),
		})),
		other => Err(unexpected(&other)),
	}
}

#[utoipa::path(
    get,
    path = "/auth/providers",
    responses(
        (status = 200, description = "Configured identity providers", body = ProvidersResponse)
    ),
    tag = "auth"
)]
/// GET /auth/providers - List configured identity providers.
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
	let providers = state
		.registry
		.providers()
		.map(|p| ProviderInfo {
			id: p.id.clone(),
			name: p.name.clone(),
			family: p.family.as_str().to_string(),
			adapter_registered: state.providers.contains(&p.id),
		})
		.collect();
	Json(ProvidersResponse { providers })
}

fn unexpected(state: &FlowState) -> ServerError {
	ServerError::Flow(FlowError::Internal(format!(
		"flow ended in unexpected state '{}'",
		state.name()
	)))
}
