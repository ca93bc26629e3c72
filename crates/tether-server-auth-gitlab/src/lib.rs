// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitLab adapter.
//!
//! Plain OAuth 2.0: the access token from `/oauth/token` is used against the
//! `/api/v4/user` endpoint (self-managed instances override both URLs).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tether_common_secret::SecretString;
use tether_server_auth::{
	exchange_authorization_code, fetch_with_bearer, split_display_name, CallbackParams,
	IdentityProvider, NormalizedIdentity, OAuthClientConfig, ProviderError,
};

pub const GITLAB_AUTHORIZE_URL: &str = "https://gitlab.com/oauth/authorize";
pub const GITLAB_TOKEN_URL: &str = "https://gitlab.com/oauth/token";
pub const GITLAB_USER_URL: &str = "https://gitlab.com/api/v4/user";
pub const GITLAB_DEFAULT_SCOPES: &[&str] = &["read_user"];

#[derive(Debug, Clone)]
pub struct GitLabOAuthConfig {
	pub oauth: OAuthClientConfig,
	pub user_url: String,
}

impl GitLabOAuthConfig {
	/// Configuration for gitlab.com with the `read_user` scope.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: SecretString,
		redirect_url: impl Into<String>,
	) -> Self {
		Self {
			oauth: OAuthClientConfig {
				client_id: client_id.into(),
				client_secret,
				authorize_url: GITLAB_AUTHORIZE_URL.to_string(),
				token_url: GITLAB_TOKEN_URL.to_string(),
				redirect_url: redirect_url.into(),
				scopes: GITLAB_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
			},
			user_url: GITLAB_USER_URL.to_string(),
		}
	}
}

/// Subset of the `/api/v4/user` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
	pub id: i64,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub avatar_url: Option<String>,
	/// Null until the user confirms their primary email.
	#[serde(default)]
	pub confirmed_at: Option<String>,
}

impl GitLabUser {
	pub fn into_identity(self) -> Result<NormalizedIdentity, ProviderError> {
		let email = self
			.email
			.filter(|e| !e.trim().is_empty())
			.ok_or_else(|| ProviderError::Parse {
				stage: "userinfo",
				message: "GitLab user has no email".to_string(),
			})?;
		let name = self
			.name
			.filter(|n| !n.trim().is_empty())
			.or(self.username)
			.unwrap_or_default();
		let (given_name, family_name) = split_display_name(&name);

		Ok(NormalizedIdentity {
			sub: self.id.to_string(),
			name,
			given_name,
			family_name,
			picture: self.avatar_url,
			email,
			email_verified: self.confirmed_at.is_some(),
		})
	}
}

pub struct GitLabProvider {
	provider_id: String,
	config: GitLabOAuthConfig,
	http: Client,
}

impl GitLabProvider {
	#[tracing::instrument(skip_all, name = "GitLabProvider::new")]
	pub fn new(
		provider_id: impl Into<String>,
		config: GitLabOAuthConfig,
		http: Client,
	) -> Result<Self, ProviderError> {
		config.oauth.validate()?;
		Ok(Self {
			provider_id: provider_id.into(),
			config,
			http,
		})
	}
}

#[async_trait]
impl IdentityProvider for GitLabProvider {
	fn provider_id(&self) -> &str {
		&self.provider_id
	}

	fn family(&self) -> &'static str {
		"gitlab"
	}

	fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError> {
		self.config.oauth.authorization_url(params)
	}

	#[tracing::instrument(skip(self, code, params), name = "GitLabProvider::exchange_code", fields(provider_id = %self.provider_id))]
	async fn exchange_code(
		&self,
		code: &str,
		params: &CallbackParams,
	) -> Result<NormalizedIdentity, ProviderError> {
		let redirect_uri = params.redirect_uri(&self.config.oauth.redirect_url)?;
		let tokens =
			exchange_authorization_code(&self.http, &self.config.oauth, code, &redirect_uri).await?;

		let user: GitLabUser = fetch_with_bearer(
			&self.http,
			&self.config.user_url,
			&tokens.access_token,
			"userinfo",
		)
		.await?;
		tracing::debug!(gitlab_user_id = user.id, "fetched GitLab user");
		user.into_identity()
	}
}
