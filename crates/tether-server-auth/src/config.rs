// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tether_common_secret::SecretString;
use url::Url;

use crate::callback::CallbackParams;
use crate::error::ProviderError;

/// OAuth 2.0 client settings shared by every adapter.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
	pub client_id: String,
	pub client_secret: SecretString,
	pub authorize_url: String,
	pub token_url: String,
	/// Redirect URI template; passthrough parameters are appended per request.
	pub redirect_url: String,
	pub scopes: Vec<String>,
}

impl OAuthClientConfig {
	/// Validate that all configuration fields are usable.
	pub fn validate(&self) -> Result<(), ProviderError> {
		if self.client_id.trim().is_empty() {
			return Err(ProviderError::InvalidConfig(
				"client_id cannot be empty".to_string(),
			));
		}
		if self.client_secret.is_blank() {
			return Err(ProviderError::InvalidConfig(
				"client_secret cannot be empty".to_string(),
			));
		}
		for (field, value) in [
			("authorize_url", &self.authorize_url),
			("token_url", &self.token_url),
			("redirect_url", &self.redirect_url),
		] {
			Url::parse(value)
				.map_err(|e| ProviderError::InvalidConfig(format!("{field} '{value}': {e}")))?;
		}
		Ok(())
	}

	/// Join scopes into a space-separated string for the authorization URL.
	pub fn scopes_string(&self) -> String {
		self.scopes.join(" ")
	}

	/// Parse a scope string into a vector of individual scopes.
	pub fn parse_scopes(scope_str: &str) -> Vec<String> {
		scope_str
			.split([' ', ','])
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	}

	/// Provider authorization URL for a login carrying `params`.
	pub fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError> {
		let redirect_uri = params.redirect_uri(&self.redirect_url)?;
		let mut url = Url::parse(&self.authorize_url).map_err(|e| {
			ProviderError::InvalidConfig(format!("authorize_url '{}': {e}", self.authorize_url))
		})?;

		url.query_pairs_mut()
			.append_pair("client_id", &self.client_id)
			.append_pair("redirect_uri", &redirect_uri)
			.append_pair("response_type", "code")
			.append_pair("scope", &self.scopes_string());

		Ok(url.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> OAuthClientConfig {
		OAuthClientConfig {
			client_id: "client-123".to_string(),
			client_secret: SecretString::from("s3cret"),
			authorize_url: "https://idp.example.com/authorize".to_string(),
			token_url: "https://idp.example.com/token".to_string(),
			redirect_url: "https://auth.example.com/auth/callback/idp".to_string(),
			scopes: vec!["openid".to_string(), "email".to_string()],
		}
	}

	#[test]
	fn authorization_url_has_required_params() {
		let params = CallbackParams::from_authorize_query(vec![
			("appId".to_string(), "acme".to_string()),
			("provider".to_string(), "idp".to_string()),
		]);
		let url = Url::parse(&config().authorization_url(&params).unwrap()).unwrap();
		let pairs: Vec<(String, String)> = url
			.query_pairs()
			.map(|(k, v)| (k.into_owned(), v.into_owned()))
			.collect();

		assert_eq!(url.host_str(), Some("idp.example.com"));
		assert!(pairs.contains(&("client_id".into(), "client-123".into())));
		assert!(pairs.contains(&("response_type".into(), "code".into())));
		assert!(pairs.contains(&("scope".into(), "openid email".into())));
		assert!(pairs.contains(&(
			"redirect_uri".into(),
			"https://auth.example.com/auth/callback/idp?appId=acme".into()
		)));
	}

	#[test]
	fn validate_rejects_blank_secret_and_bad_urls() {
		let mut c = config();
		c.client_secret = SecretString::from(" ");
		assert!(c.validate().is_err());

		let mut c = config();
		c.token_url = "token".to_string();
		assert!(matches!(c.validate(), Err(ProviderError::InvalidConfig(m)) if m.contains("token_url")));

		assert!(config().validate().is_ok());
	}

	#[test]
	fn parse_scopes_accepts_spaces_and_commas() {
		assert_eq!(
			OAuthClientConfig::parse_scopes("openid, email  profile"),
			vec!["openid", "email", "profile"]
		);
	}
}
