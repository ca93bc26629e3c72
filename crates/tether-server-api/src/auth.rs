// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Types for the `/auth` routes.
//!
//! Top-level fields are camelCase to match what tenant front-ends send and
//! expect; the identity object keeps the OpenID claim names.

use serde::{Deserialize, Serialize};
use tether_server_auth::NormalizedIdentity;

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

/// Query for `GET /auth/authorize/{providerId}`. Every other parameter is
/// forwarded to the callback URL.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeQuery {
	/// Tenant id.
	pub app_id: String,
}

/// Normalized identity as returned to the tenant front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IdentityResponse {
	pub sub: String,
	pub name: String,
	pub given_name: String,
	pub family_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub picture: Option<String>,
	pub email: String,
	pub email_verified: bool,
}

impl From<NormalizedIdentity> for IdentityResponse {
	fn from(identity: NormalizedIdentity) -> Self {
		Self {
			sub: identity.sub,
			name: identity.name,
			given_name: identity.given_name,
			family_name: identity.family_name,
			picture: identity.picture,
			email: identity.email,
			email_verified: identity.email_verified,
		}
	}
}

/// Result of `GET /auth/callback/{providerId}`.
///
/// When `linked` is false the front-end collects `linkFields` from the user
/// and posts them with `linkTicket` to `/auth/link-account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
	pub user: IdentityResponse,
	pub linked: bool,
	pub link_fields: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub link_ticket: Option<String>,
}

/// Body of `POST /auth/link-account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LinkAccountRequest {
	/// Credential fields named by the tenant's `linkFields`.
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub payload: serde_json::Value,
	pub app_id: String,
	pub provider_id: String,
	pub link_ticket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LinkAccountResponse {
	pub linked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProviderInfo {
	pub id: String,
	pub name: String,
	pub family: String,
	/// False when the family has no adapter; such providers cannot be used.
	pub adapter_registered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProvidersResponse {
	pub providers: Vec<ProviderInfo>,
}

/// Error body for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AuthErrorResponse {
	pub error: String,
	pub message: String,
}
