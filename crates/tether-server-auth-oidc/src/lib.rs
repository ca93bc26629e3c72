// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Generic OpenID Connect adapter.
//!
//! There are no built-in endpoints: `authorize_url` and `token_url` are
//! required, plus at least one of `jwks_url` (ID-token verification) or
//! `userinfo_url` (bearer user-info call). When both are present and the
//! token response carries an ID token, the ID token wins.

use async_trait::async_trait;
use reqwest::Client;
use tether_server_auth::{
	exchange_authorization_code, fetch_with_bearer, CallbackParams, IdTokenClaims,
	IdTokenVerifier, IdentityProvider, NormalizedIdentity, OAuthClientConfig, ProviderError,
};

pub const OIDC_DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

#[derive(Debug, Clone)]
pub struct OidcConfig {
	pub oauth: OAuthClientConfig,
	pub userinfo_url: Option<String>,
	pub jwks_url: Option<String>,
	/// Expected `iss`; unchecked when `None`.
	pub issuer: Option<String>,
}

impl OidcConfig {
	pub fn validate(&self) -> Result<(), ProviderError> {
		self.oauth.validate()?;
		if self.userinfo_url.is_none() && self.jwks_url.is_none() {
			return Err(ProviderError::InvalidConfig(
				"OpenID provider needs jwks_url or userinfo_url".to_string(),
			));
		}
		Ok(())
	}
}

pub struct OidcProvider {
	provider_id: String,
	config: OidcConfig,
	http: Client,
	verifier: Option<IdTokenVerifier>,
	issuers: Vec<String>,
}

impl OidcProvider {
	#[tracing::instrument(skip_all, name = "OidcProvider::new")]
	pub fn new(
		provider_id: impl Into<String>,
		config: OidcConfig,
		http: Client,
	) -> Result<Self, ProviderError> {
		config.validate()?;
		let verifier = config
			.jwks_url
			.as_ref()
			.map(|url| IdTokenVerifier::new(http.clone(), url.clone()));
		let issuers = config.issuer.iter().cloned().collect();
		Ok(Self {
			provider_id: provider_id.into(),
			config,
			http,
			verifier,
			issuers,
		})
	}
}

#[async_trait]
impl IdentityProvider for OidcProvider {
	fn provider_id(&self) -> &str {
		&self.provider_id
	}

	fn family(&self) -> &'static str {
		"oidc"
	}

	fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError> {
		self.config.oauth.authorization_url(params)
	}

	#[tracing::instrument(skip(self, code, params), name = "OidcProvider::exchange_code", fields(provider_id = %self.provider_id))]
	async fn exchange_code(
		&self,
		code: &str,
		params: &CallbackParams,
	) -> Result<NormalizedIdentity, ProviderError> {
		let redirect_uri = params.redirect_uri(&self.config.oauth.redirect_url)?;
		let tokens =
			exchange_authorization_code(&self.http, &self.config.oauth, code, &redirect_uri).await?;

		if let (Some(verifier), Some(id_token)) = (&self.verifier, &tokens.id_token) {
			let claims = verifier
				.verify(id_token.expose(), &self.config.oauth.client_id, &self.issuers)
				.await?;
			return claims.into_identity("id_token");
		}

		let Some(userinfo_url) = &self.config.userinfo_url else {
			return Err(ProviderError::Parse {
				stage: "token",
				message: "token response has no id_token and no userinfo_url is configured"
					.to_string(),
			});
		};
		let claims: IdTokenClaims =
			fetch_with_bearer(&self.http, userinfo_url, &tokens.access_token, "userinfo").await?;
		claims.into_identity("userinfo")
	}
}
