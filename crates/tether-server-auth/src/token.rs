// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token-endpoint and bearer-API helpers shared by the adapters.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tether_common_secret::SecretString;

use crate::config::OAuthClientConfig;
use crate::error::ProviderError;

/// Response from a provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
	pub access_token: SecretString,
	#[serde(default)]
	pub id_token: Option<SecretString>,
	#[serde(default)]
	pub token_type: Option<String>,
	#[serde(default)]
	pub expires_in: Option<u64>,
	#[serde(default)]
	pub scope: Option<String>,
}

/// Exchange an authorization code at `config.token_url`.
///
/// `redirect_uri` must be byte-identical to the one sent at authorize time.
#[tracing::instrument(skip(http, config, code), fields(client_id = %config.client_id, token_url = %config.token_url))]
pub async fn exchange_authorization_code(
	http: &Client,
	config: &OAuthClientConfig,
	code: &str,
	redirect_uri: &str,
) -> Result<TokenResponse, ProviderError> {
	tracing::debug!("exchanging authorization code for access token");

	let response = http
		.post(&config.token_url)
		.header("Accept", "application/json")
		.form(&[
			("code", code),
			("client_id", config.client_id.as_str()),
			("client_secret", config.client_secret.expose().as_str()),
			("grant_type", "authorization_code"),
			("redirect_uri", redirect_uri),
		])
		.send()
		.await
		.map_err(|source| ProviderError::Transport {
			stage: "token",
			source,
		})?;

	let status = response.status();
	let body = response.text().await.map_err(|source| ProviderError::Transport {
		stage: "token",
		source,
	})?;

	if !status.is_success() {
		tracing::warn!(status = status.as_u16(), body = %body, "token endpoint rejected code");
		return Err(ProviderError::upstream("token", status.as_u16(), &body));
	}

	let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
		stage: "token",
		message: e.to_string(),
	})?;

	// Some servers report OAuth errors with a 200.
	if value.get("error").and_then(|e| e.as_str()).is_some() {
		tracing::warn!(status = status.as_u16(), body = %body, "token endpoint returned an OAuth error");
		return Err(ProviderError::upstream("token", status.as_u16(), &body));
	}

	serde_json::from_value(value).map_err(|e| ProviderError::Parse {
		stage: "token",
		message: e.to_string(),
	})
}

/// GET a JSON document with a bearer access token.
#[tracing::instrument(skip(http, access_token))]
pub async fn fetch_with_bearer<T>(
	http: &Client,
	url: &str,
	access_token: &SecretString,
	stage: &'static str,
) -> Result<T, ProviderError>
where
	T: DeserializeOwned,
{
	tracing::debug!("fetching provider user info");

	let response = http
		.get(url)
		.header("Accept", "application/json")
		.bearer_auth(access_token.expose())
		.send()
		.await
		.map_err(|source| ProviderError::Transport { stage, source })?;

	let status = response.status();
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		tracing::warn!(status = status.as_u16(), body = %body, "user info request failed");
		return Err(ProviderError::upstream(stage, status.as_u16(), &body));
	}

	response.json().await.map_err(|e| ProviderError::Parse {
		stage,
		message: e.to_string(),
	})
}
