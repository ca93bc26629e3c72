// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Google adapter.
//!
//! Google is used as an OpenID Connect provider: the token endpoint returns
//! an ID token, which is verified against Google's JWKS with the client id
//! as audience and `accounts.google.com` (with or without scheme) as issuer.
//! The user-info endpoint is not called.

use async_trait::async_trait;
use reqwest::Client;
use tether_common_secret::SecretString;
use tether_server_auth::{
	exchange_authorization_code, CallbackParams, IdTokenVerifier, IdentityProvider,
	NormalizedIdentity, OAuthClientConfig, ProviderError,
};

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];
pub const GOOGLE_DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
	pub oauth: OAuthClientConfig,
	pub jwks_url: String,
	/// Accepted `iss` values.
	pub issuers: Vec<String>,
}

impl GoogleOAuthConfig {
	/// Configuration with Google's public endpoints and default scopes.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: SecretString,
		redirect_url: impl Into<String>,
	) -> Self {
		Self {
			oauth: OAuthClientConfig {
				client_id: client_id.into(),
				client_secret,
				authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
				token_url: GOOGLE_TOKEN_URL.to_string(),
				redirect_url: redirect_url.into(),
				scopes: GOOGLE_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
			},
			jwks_url: GOOGLE_JWKS_URL.to_string(),
			issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
		}
	}
}

pub struct GoogleProvider {
	provider_id: String,
	config: GoogleOAuthConfig,
	http: Client,
	verifier: IdTokenVerifier,
}

impl GoogleProvider {
	#[tracing::instrument(skip_all, name = "GoogleProvider::new")]
	pub fn new(
		provider_id: impl Into<String>,
		config: GoogleOAuthConfig,
		http: Client,
	) -> Result<Self, ProviderError> {
		config.oauth.validate()?;
		let verifier = IdTokenVerifier::new(http.clone(), config.jwks_url.clone());
		Ok(Self {
			provider_id: provider_id.into(),
			config,
			http,
			verifier,
		})
	}
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
	fn provider_id(&self) -> &str {
		&self.provider_id
	}

	fn family(&self) -> &'static str {
		"google"
	}

	#[tracing::instrument(skip(self, params), fields(provider_id = %self.provider_id))]
	fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError> {
		self.config.oauth.authorization_url(params)
	}

	#[tracing::instrument(skip(self, code, params), name = "GoogleProvider::exchange_code", fields(provider_id = %self.provider_id))]
	async fn exchange_code(
		&self,
		code: &str,
		params: &CallbackParams,
	) -> Result<NormalizedIdentity, ProviderError> {
		let redirect_uri = params.redirect_uri(&self.config.oauth.redirect_url)?;
		let tokens =
			exchange_authorization_code(&self.http, &self.config.oauth, code, &redirect_uri).await?;

		let id_token = tokens.id_token.ok_or_else(|| ProviderError::Parse {
			stage: "token",
			message: "token response has no id_token".to_string(),
		})?;

		let claims = self
			.verifier
			.verify(
				id_token.expose(),
				&self.config.oauth.client_id,
				&self.config.issuers,
			)
			.await?;
		claims.into_identity("id_token")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tether_server_auth::testing::{id_token_claims, sign_test_id_token, test_jwks, TEST_KEY_ID};
	use wiremock::matchers::{body_string_contains, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const CLIENT_ID: &str = "google-client.apps.googleusercontent.com";

	fn provider(server: &MockServer) -> GoogleProvider {
		let mut config = GoogleOAuthConfig::new(
			CLIENT_ID,
			SecretString::from("google-secret"),
			"https://auth.example.com/auth/callback/google",
		);
		config.oauth.token_url = format!("{}/token", server.uri());
		config.jwks_url = format!("{}/certs", server.uri());
		GoogleProvider::new("google", config, Client::new()).unwrap()
	}

	fn params() -> CallbackParams {
		CallbackParams::from_callback_query(vec![
			("appId".to_string(), "acme".to_string()),
			("code".to_string(), "auth-code".to_string()),
		])
	}

	async fn mount_certs(server: &MockServer) {
		Mock::given(method("GET"))
			.and(path("/certs"))
			.respond_with(ResponseTemplate::new(200).set_body_json(test_jwks()))
			.mount(server)
			.await;
	}

	#[test]
	fn authorization_url_targets_google() {
		let config = GoogleOAuthConfig::new(
			CLIENT_ID,
			SecretString::from("s"),
			"https://auth.example.com/auth/callback/google",
		);
		let provider = GoogleProvider::new("google", config, Client::new()).unwrap();
		let url = provider
			.authorization_url(&CallbackParams::from_authorize_query(vec![(
				"appId".to_string(),
				"acme".to_string(),
			)]))
			.unwrap();
		assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
		assert!(url.contains("scope=openid+email+profile"));
		assert!(url.contains("response_type=code"));
	}

	#[tokio::test]
	async fn exchange_verifies_id_token() {
		let server = MockServer::start().await;
		mount_certs(&server).await;
		let token = sign_test_id_token(
			&id_token_claims("https://accounts.google.com", CLIENT_ID, "1184", "a@x.com"),
			TEST_KEY_ID,
		);
		Mock::given(method("POST"))
			.and(path("/token"))
			.and(body_string_contains("appId%3Dacme"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"access_token": "ya29.x",
				"id_token": token,
				"token_type": "Bearer"
			})))
			.expect(1)
			.mount(&server)
			.await;

		let identity = provider(&server).exchange_code("auth-code", &params()).await.unwrap();
		assert_eq!(identity.sub, "1184");
		assert_eq!(identity.email, "a@x.com");
		assert_eq!(identity.given_name, "Test");
		assert_eq!(identity.family_name, "User");
		assert!(identity.email_verified);
	}

	#[tokio::test]
	async fn bare_issuer_is_accepted() {
		let server = MockServer::start().await;
		mount_certs(&server).await;
		let token = sign_test_id_token(
			&id_token_claims("accounts.google.com", CLIENT_ID, "7", "b@x.com"),
			TEST_KEY_ID,
		);
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"access_token": "ya29.x",
				"id_token": token
			})))
			.mount(&server)
			.await;

		let identity = provider(&server).exchange_code("c", &params()).await.unwrap();
		assert_eq!(identity.sub, "7");
	}

	#[tokio::test]
	async fn token_for_other_client_is_rejected() {
		let server = MockServer::start().await;
		mount_certs(&server).await;
		let token = sign_test_id_token(
			&id_token_claims("https://accounts.google.com", "other-client", "7", "b@x.com"),
			TEST_KEY_ID,
		);
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"access_token": "ya29.x",
				"id_token": token
			})))
			.mount(&server)
			.await;

		let err = provider(&server).exchange_code("c", &params()).await.unwrap_err();
		assert!(matches!(err, ProviderError::InvalidIdToken(_)));
	}

	#[tokio::test]
	async fn missing_id_token_is_parse_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "ya29.x"})),
			)
			.mount(&server)
			.await;

		let err = provider(&server).exchange_code("c", &params()).await.unwrap_err();
		assert!(matches!(err, ProviderError::Parse { stage: "token", .. }));
	}

	#[tokio::test]
	async fn rejected_code_surfaces_upstream_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
			.mount(&server)
			.await;

		let err = provider(&server).exchange_code("c", &params()).await.unwrap_err();
		assert_eq!(err.upstream_status(), Some(400));
	}
}
