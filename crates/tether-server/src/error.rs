// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Linking-flow error taxonomy and its HTTP mapping.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use tether_server_account::AccountError;
use tether_server_api::AuthErrorResponse;
use tether_server_auth::ProviderError;
use tether_server_config::RegistryError;
use tether_server_db::DbError;

use crate::link_ticket::LinkTicketError;

/// Every way a linking flow step can fail.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
	#[error("{0}")]
	ConfigNotFound(String),

	#[error("{0}")]
	RoleMismatch(String),

	#[error("unsupported provider: {0}")]
	UnsupportedProvider(String),

	#[error("{0}")]
	BadRequest(String),

	#[error("provider exchange failed: {0}")]
	ProviderExchange(#[source] ProviderError),

	#[error("no account matches the supplied credentials")]
	AccountNotFound,

	#[error("account belongs to a different client")]
	AccountMismatch,

	#[error("invalid credentials: {0}")]
	InvalidCredentials(String),

	#[error("account system request failed: {0}")]
	AccountSystem(#[source] AccountError),

	#[error("invalid link ticket: {0}")]
	InvalidLinkTicket(#[from] LinkTicketError),

	#[error("link store error: {0}")]
	LinkStore(#[from] DbError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<RegistryError> for FlowError {
	fn from(err: RegistryError) -> Self {
		match err {
			RegistryError::NotFound { .. } => FlowError::ConfigNotFound(err.to_string()),
			RegistryError::RoleMismatch { .. } => FlowError::RoleMismatch(err.to_string()),
		}
	}
}

impl From<AccountError> for FlowError {
	fn from(err: AccountError) -> Self {
		match err {
			AccountError::NotFound => FlowError::AccountNotFound,
			AccountError::Mismatch => FlowError::AccountMismatch,
			AccountError::InvalidCredentials(message) => FlowError::InvalidCredentials(message),
			other => FlowError::AccountSystem(other),
		}
	}
}

impl FlowError {
	/// Failure to mint a ticket is a server fault, unlike a rejected ticket.
	pub fn ticket_issue(err: LinkTicketError) -> Self {
		FlowError::Internal(format!("failed to issue link ticket: {err}"))
	}

	pub fn status(&self) -> StatusCode {
		match self {
			FlowError::ConfigNotFound(_)
			| FlowError::RoleMismatch(_)
			| FlowError::UnsupportedProvider(_)
			| FlowError::BadRequest(_)
			| FlowError::InvalidCredentials(_)
			| FlowError::InvalidLinkTicket(_) => StatusCode::BAD_REQUEST,
			FlowError::AccountNotFound => StatusCode::NOT_FOUND,
			FlowError::AccountMismatch => StatusCode::FORBIDDEN,
			FlowError::ProviderExchange(_) | FlowError::AccountSystem(_) => StatusCode::BAD_GATEWAY,
			FlowError::LinkStore(_) | FlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable machine-readable code for the `error` field.
	pub fn code(&self) -> &'static str {
		match self {
			FlowError::ConfigNotFound(_) => "config_not_found",
			FlowError::RoleMismatch(_) => "role_mismatch",
			FlowError::UnsupportedProvider(_) => "unsupported_provider",
			FlowError::BadRequest(_) => "bad_request",
			FlowError::ProviderExchange(_) => "provider_exchange_failed",
			FlowError::AccountNotFound => "account_not_found",
			FlowError::AccountMismatch => "account_mismatch",
			FlowError::InvalidCredentials(_) => "invalid_credentials",
			FlowError::AccountSystem(_) => "account_system_error",
			FlowError::InvalidLinkTicket(_) => "invalid_link_ticket",
			FlowError::LinkStore(_) => "link_store_error",
			FlowError::Internal(_) => "internal_error",
		}
	}

	/// Message safe to return to the caller. Upstream and storage detail
	/// stays in the logs.
	pub fn public_message(&self) -> String {
		match self {
			FlowError::ProviderExchange(_) => "identity provider exchange failed".to_string(),
			FlowError::AccountSystem(_) => "account system request failed".to_string(),
			FlowError::LinkStore(_) | FlowError::Internal(_) => {
				"internal server error".to_string()
			}
			other => other.to_string(),
		}
	}
}

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Flow(#[from] FlowError),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let flow = match self {
			ServerError::Flow(err) => err,
			ServerError::BadRequest(message) => FlowError::BadRequest(message),
			ServerError::Internal(message) => FlowError::Internal(message),
		};

		let status = flow.status();
		if status.is_server_error() {
			tracing::error!(error = %flow, code = flow.code(), status = status.as_u16(), "request failed");
		} else {
			tracing::info!(error = %flow, code = flow.code(), status = status.as_u16(), "request rejected");
		}

		let body = AuthErrorResponse {
			error: flow.code().to_string(),
			message: flow.public_message(),
		};
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::Value;
	use tether_server_config::Role;

	#[test]
	fn registry_errors_keep_context_in_message() {
		let err: FlowError = RegistryError::NotFound {
			id: "nope".to_string(),
			context: "authorize".to_string(),
			expected: Some(Role::Tenant),
		}
		.into();
		assert_eq!(err.status(), StatusCode::BAD_REQUEST);
		assert_eq!(err.public_message(), "authorize: unknown tenant: nope");

		let err: FlowError = RegistryError::RoleMismatch {
			id: "acme".to_string(),
			context: "authorize".to_string(),
			expected: Role::Provider,
			actual: Role::Tenant,
		}
		.into();
		assert_eq!(err.code(), "role_mismatch");
	}

	#[test]
	fn account_errors_normalize() {
		assert!(matches!(FlowError::from(AccountError::NotFound), FlowError::AccountNotFound));
		assert!(matches!(FlowError::from(AccountError::Mismatch), FlowError::AccountMismatch));
		let err = FlowError::from(AccountError::Upstream {
			status: 500,
			body: "stack trace".to_string(),
		});
		assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
		assert!(!err.public_message().contains("stack trace"));
	}

	#[test]
	fn ticket_faults_split_by_side() {
		let encode = serde_json::from_str::<Value>("{").unwrap_err();
		let issued = FlowError::ticket_issue(LinkTicketError::Encode(encode));
		assert_eq!(issued.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(issued.public_message(), "internal server error");

		let presented = FlowError::from(LinkTicketError::Expired);
		assert_eq!(presented.status(), StatusCode::BAD_REQUEST);
		assert_eq!(presented.code(), "invalid_link_ticket");
	}

	#[test]
	fn status_table() {
		let cases = [
			(FlowError::UnsupportedProvider("x".into()), StatusCode::BAD_REQUEST),
			(FlowError::InvalidCredentials("x".into()), StatusCode::BAD_REQUEST),
			(FlowError::AccountNotFound, StatusCode::NOT_FOUND),
			(FlowError::AccountMismatch, StatusCode::FORBIDDEN),
			(
				FlowError::ProviderExchange(ProviderError::upstream("token", 400, "bad code")),
				StatusCode::BAD_GATEWAY,
			),
			(
				FlowError::LinkStore(DbError::Internal("x".into())),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];
		for (err, status) in cases {
			assert_eq!(err.status(), status, "{err}");
		}
	}
}
