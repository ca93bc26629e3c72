// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tether_common_secret::SecretString;
use tether_server_config::TenantConfig;

use crate::credentials::CredentialFields;
use crate::error::AccountError;

const ACCOUNT_ID_PLACEHOLDER: &str = "{accountId}";
const MAX_BODY_LEN: usize = 1024;

/// HTTP client for tenant systems of record. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AccountClient {
	http: Client,
}

impl AccountClient {
	/// `http` should carry the account timeout.
	pub fn new(http: Client) -> Self {
		Self { http }
	}

	fn authorized(&self, request: RequestBuilder, tenant: &TenantConfig) -> RequestBuilder {
		request
			.bearer_auth(tenant.account_api_key.expose())
			.header(ACCEPT, "application/json")
	}

	/// Map credential fields to the tenant's account identifier.
	#[tracing::instrument(skip(self, tenant, fields), fields(tenant_id = %tenant.id, route = %tenant.resolve_route))]
	pub async fn resolve_account_id(
		&self,
		tenant: &TenantConfig,
		fields: &CredentialFields,
	) -> Result<String, AccountError> {
		let url = format!("{}{}", tenant.account_api_url, tenant.resolve_route);
		let response = self
			.authorized(self.http.post(&url), tenant)
			.json(&fields.to_json())
			.send()
			.await
			.map_err(|e| {
				tracing::warn!(error = %e, timeout = e.is_timeout(), "resolve request failed");
				AccountError::Transport(e)
			})?;

		let status = response.status().as_u16();
		let body = response.text().await.map_err(AccountError::Transport)?;
		let result = interpret_resolve(status, &body);
		match &result {
			Ok(_) => tracing::debug!(status, "account resolved"),
			Err(e @ (AccountError::NotFound | AccountError::Mismatch)) => {
				tracing::info!(status, error = %e, "account not resolved")
			}
			Err(e) => tracing::warn!(status, body = %truncate(&body), error = %e, "resolve failed"),
		}
		result
	}

	/// Ask the system of record for a session token for `account_id`.
	///
	/// Every failure is reported as [`AccountError::TokenIssuance`].
	#[tracing::instrument(skip(self, tenant, account_id), fields(tenant_id = %tenant.id))]
	pub async fn issue_token(
		&self,
		tenant: &TenantConfig,
		account_id: &str,
	) -> Result<SecretString, AccountError> {
		let request = if tenant.token_route.contains(ACCOUNT_ID_PLACEHOLDER) {
			let route = tenant
				.token_route
				.replace(ACCOUNT_ID_PLACEHOLDER, &encode_path_segment(account_id));
			self.http.get(format!("{}{}", tenant.account_api_url, route))
		} else {
			self.http
				.get(format!("{}{}", tenant.account_api_url, tenant.token_route))
				.query(&[("accountId", account_id)])
		};

		let response = self
			.authorized(request, tenant)
			.send()
			.await
			.map_err(|e| AccountError::TokenIssuance(e.to_string()))?;

		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| AccountError::TokenIssuance(e.to_string()))?;
		if !status.is_success() {
			return Err(AccountError::TokenIssuance(format!(
				"status {}: {}",
				status.as_u16(),
				truncate(&body)
			)));
		}

		#[derive(Deserialize)]
		struct TokenBody {
			#[serde(default)]
			token: Option<String>,
		}

		let parsed: TokenBody = serde_json::from_str(&body)
			.map_err(|e| AccountError::TokenIssuance(format!("invalid token response: {e}")))?;
		parsed
			.token
			.filter(|t| !t.is_empty())
			.map(SecretString::new)
			.ok_or_else(|| AccountError::TokenIssuance("response has no token".to_string()))
	}
}

fn interpret_resolve(status: u16, body: &str) -> Result<String, AccountError> {
	let parsed: Option<Value> = serde_json::from_str(body).ok();

	if let Some(code) = parsed
		.as_ref()
		.and_then(|v| v.get("error"))
		.and_then(Value::as_str)
	{
		match code {
			"USER_NOT_FOUND" => return Err(AccountError::NotFound),
			"CLIENT_MISMATCH" | "ACCOUNT_MISMATCH" => return Err(AccountError::Mismatch),
			_ => {}
		}
	}

	match status {
		404 => return Err(AccountError::NotFound),
		403 => return Err(AccountError::Mismatch),
		s if !(200..300).contains(&s) => {
			return Err(AccountError::Upstream {
				status,
				body: truncate(body),
			});
		}
		_ => {}
	}

	let value =
		parsed.ok_or_else(|| AccountError::MalformedResponse("body is not JSON".to_string()))?;
	let object = value
		.as_object()
		.ok_or_else(|| AccountError::MalformedResponse("body is not a JSON object".to_string()))?;

	let identifier = object
		.get("identifier")
		.or_else(|| object.get("accountId"));
	match identifier {
		None => Err(AccountError::MalformedResponse(
			"response has neither identifier nor accountId".to_string(),
		)),
		Some(Value::Null) => Err(AccountError::NotFound),
		Some(Value::String(s)) if s.trim().is_empty() => Err(AccountError::NotFound),
		Some(Value::String(s)) => Ok(s.clone()),
		Some(Value::Number(n)) => Ok(n.to_string()),
		Some(other) => Err(AccountError::MalformedResponse(format!(
			"identifier has unexpected type: {other}"
		))),
	}
}

fn encode_path_segment(value: &str) -> String {
	// byte_serialize escapes a literal '+', so any '+' left is a space.
	url::form_urlencoded::byte_serialize(value.as_bytes())
		.collect::<String>()
		.replace('+', "%20")
}

fn truncate(body: &str) -> String {
	if body.len() <= MAX_BODY_LEN {
		return body.to_string();
	}
	let mut end = MAX_BODY_LEN;
	while !body.is_char_boundary(end) {
		end -= 1;
	}
	format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::credentials::validate_credentials;
	use serde_json::json;
	use std::time::Duration;
	use tether_server_config::registry::{DEFAULT_RESOLVE_ROUTE, DEFAULT_TOKEN_ROUTE};
	use wiremock::matchers::{body_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn tenant(server: &MockServer) -> TenantConfig {
		TenantConfig {
			id: "acme".to_string(),
			name: "Acme".to_string(),
			account_api_url: server.uri(),
			account_api_key: SecretString::from("acme-key"),
			app_url: "https://acme.example.com".to_string(),
			link_fields: vec!["email".to_string(), "password".to_string()],
			resolve_route: DEFAULT_RESOLVE_ROUTE.to_string(),
			token_route: DEFAULT_TOKEN_ROUTE.to_string(),
		}
	}

	fn client() -> AccountClient {
		AccountClient::new(
			tether_common_http::new_client_with_timeout(Duration::from_secs(5)).unwrap(),
		)
	}

	fn creds() -> CredentialFields {
		validate_credentials(
			&["email".to_string(), "password".to_string()],
			&json!({"email": "a@x.com", "password": "pw"}),
		)
		.unwrap()
	}

	async fn resolve_with(response: ResponseTemplate) -> Result<String, AccountError> {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/accounts/resolve"))
			.respond_with(response)
			.mount(&server)
			.await;
		client().resolve_account_id(&tenant(&server), &creds()).await
	}

	#[tokio::test]
	async fn resolve_posts_fields_with_bearer_key() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/accounts/resolve"))
			.and(header("authorization", "Bearer acme-key"))
			.and(header("accept", "application/json"))
			.and(body_json(json!({"email": "a@x.com", "password": "pw"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"identifier": "7_3"})))
			.expect(1)
			.mount(&server)
			.await;

		let id = client()
			.resolve_account_id(&tenant(&server), &creds())
			.await
			.unwrap();
		assert_eq!(id, "7_3");
	}

	#[tokio::test]
	async fn resolve_accepts_account_id_field() {
		let id = resolve_with(ResponseTemplate::new(200).set_body_json(json!({"accountId": 42})))
			.await
			.unwrap();
		assert_eq!(id, "42");
	}

	#[tokio::test]
	async fn not_found_variants() {
		for response in [
			ResponseTemplate::new(404),
			ResponseTemplate::new(200).set_body_json(json!({"identifier": null})),
			ResponseTemplate::new(200).set_body_json(json!({"error": "USER_NOT_FOUND"})),
			ResponseTemplate::new(400).set_body_json(json!({"error": "USER_NOT_FOUND"})),
		] {
			let err = resolve_with(response).await.unwrap_err();
			assert!(matches!(err, AccountError::NotFound), "{err:?}");
		}
	}

	#[tokio::test]
	async fn mismatch_variants() {
		for response in [
			ResponseTemplate::new(403),
			ResponseTemplate::new(400).set_body_json(json!({"error": "CLIENT_MISMATCH"})),
			ResponseTemplate::new(200).set_body_json(json!({"error": "ACCOUNT_MISMATCH"})),
		] {
			let err = resolve_with(response).await.unwrap_err();
			assert!(matches!(err, AccountError::Mismatch), "{err:?}");
		}
	}

	#[tokio::test]
	async fn server_error_is_upstream() {
		let err = resolve_with(ResponseTemplate::new(500).set_body_string("boom"))
			.await
			.unwrap_err();
		assert!(matches!(err, AccountError::Upstream { status: 500, ref body } if body == "boom"));
	}

	#[tokio::test]
	async fn malformed_bodies() {
		for response in [
			ResponseTemplate::new(200).set_body_string("<html>"),
			ResponseTemplate::new(200).set_body_json(json!({"id": "7"})),
			ResponseTemplate::new(200).set_body_json(json!({"identifier": ["7"]})),
		] {
			let err = resolve_with(response).await.unwrap_err();
			assert!(matches!(err, AccountError::MalformedResponse(_)), "{err:?}");
		}
	}

	#[tokio::test]
	async fn slow_system_of_record_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
			.mount(&server)
			.await;
		let client = AccountClient::new(
			tether_common_http::new_client_with_timeout(Duration::from_millis(50)).unwrap(),
		);
		let err = client
			.resolve_account_id(&tenant(&server), &creds())
			.await
			.unwrap_err();
		assert!(err.is_timeout());
	}

	#[tokio::test]
	async fn token_route_substitutes_encoded_account_id() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/accounts/7%203/token"))
			.and(header("authorization", "Bearer acme-key"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt-1"})))
			.expect(1)
			.mount(&server)
			.await;

		let token = client().issue_token(&tenant(&server), "7 3").await.unwrap();
		assert_eq!(token.expose(), "jwt-1");
	}

	#[tokio::test]
	async fn token_route_without_placeholder_uses_query() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/googleauth/get_jwt"))
			.and(query_param("accountId", "7_3"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt-2"})))
			.expect(1)
			.mount(&server)
			.await;

		let mut tenant = tenant(&server);
		tenant.token_route = "/googleauth/get_jwt".to_string();
		let token = client().issue_token(&tenant, "7_3").await.unwrap();
		assert_eq!(token.expose(), "jwt-2");
	}

	#[tokio::test]
	async fn token_failures_are_token_issuance() {
		for response in [
			ResponseTemplate::new(500),
			ResponseTemplate::new(200).set_body_json(json!({"error": "USER_NOT_FOUND"})),
			ResponseTemplate::new(200).set_body_json(json!({"token": ""})),
			ResponseTemplate::new(200).set_body_string("not json"),
		] {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.respond_with(response)
				.mount(&server)
				.await;
			let err = client().issue_token(&tenant(&server), "7_3").await.unwrap_err();
			assert!(matches!(err, AccountError::TokenIssuance(_)), "{err:?}");
		}
	}

	#[test]
	fn path_segments_are_percent_encoded() {
		assert_eq!(encode_path_segment("a/b c+d"), "a%2Fb%20c%2Bd");
	}
}
