// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Callback URL construction.
//!
//! The broker forwards the query parameters of the authorize request
//! (`appId` included) onto the provider's redirect URI, so the callback
//! knows which tenant the login belongs to. The token exchange must send
//! the identical redirect URI, so on the callback side the same parameter
//! set is rebuilt by removing what the provider appended. Keys the provider
//! appends are never forwarded in the first place, so both sides apply the
//! same filter.

use url::Url;

use crate::error::ProviderError;

/// Reserved key that is never forwarded.
pub const PROVIDER_PARAM: &str = "provider";

/// Keys an authorization server adds to the redirect.
pub const OAUTH_RESPONSE_PARAMS: &[&str] = &[
	"code",
	"state",
	"scope",
	"authuser",
	"hd",
	"prompt",
	"session_state",
	"iss",
	"error",
	"error_description",
	"error_uri",
];

fn is_forwarded(key: &str) -> bool {
	key != PROVIDER_PARAM && !OAUTH_RESPONSE_PARAMS.contains(&key)
}

/// First key in `query` that collides with an authorization response key.
pub fn reserved_response_key(query: &[(String, String)]) -> Option<&str> {
	query
		.iter()
		.map(|(k, _)| k.as_str())
		.find(|k| OAUTH_RESPONSE_PARAMS.contains(k))
}

/// Ordered passthrough parameters carried on the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
	pairs: Vec<(String, String)>,
}

impl CallbackParams {
	/// Parameters of an inbound authorize request. Authorization response
	/// keys are dropped; callers that must refuse them check
	/// [`reserved_response_key`] first.
	pub fn from_authorize_query<I>(query: I) -> Self
	where
		I: IntoIterator<Item = (String, String)>,
	{
		Self {
			pairs: query.into_iter().filter(|(k, _)| is_forwarded(k)).collect(),
		}
	}

	/// Parameters of an inbound callback, minus what the provider appended.
	pub fn from_callback_query<I>(query: I) -> Self
	where
		I: IntoIterator<Item = (String, String)>,
	{
		Self {
			pairs: query.into_iter().filter(|(k, _)| is_forwarded(k)).collect(),
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.pairs
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	pub fn pairs(&self) -> &[(String, String)] {
		&self.pairs
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// Append the parameters to a redirect template. Keys already present in
	/// the template's own query are left to the template.
	pub fn redirect_uri(&self, template: &str) -> Result<String, ProviderError> {
		let mut url = Url::parse(template)
			.map_err(|e| ProviderError::InvalidConfig(format!("redirect_url '{template}': {e}")))?;

		let existing: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
		let extra: Vec<&(String, String)> = self
			.pairs
			.iter()
			.filter(|(k, _)| !existing.contains(k))
			.collect();

		if !extra.is_empty() {
			let mut query = url.query_pairs_mut();
			for (k, v) in extra {
				query.append_pair(k, v);
			}
		}
		Ok(url.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn authorize_query_drops_provider() {
		let params = CallbackParams::from_authorize_query(q(&[
			("appId", "acme"),
			("provider", "google"),
			("lang", "en"),
		]));
		assert_eq!(params.pairs(), q(&[("appId", "acme"), ("lang", "en")]).as_slice());
		assert_eq!(params.get("appId"), Some("acme"));
	}

	#[test]
	fn tenant_state_param_does_not_change_redirect_uri() {
		let template = "https://auth.example.com/auth/callback/google";
		let sent = CallbackParams::from_authorize_query(q(&[("appId", "acme"), ("state", "tenant-csrf")]))
			.redirect_uri(template)
			.unwrap();
		assert_eq!(sent, "https://auth.example.com/auth/callback/google?appId=acme");

		let rebuilt = CallbackParams::from_callback_query(q(&[
			("appId", "acme"),
			("code", "c"),
			("state", "idp-state"),
		]))
		.redirect_uri(template)
		.unwrap();
		assert_eq!(rebuilt, sent);
	}

	#[test]
	fn reserved_response_key_finds_collisions() {
		assert_eq!(
			reserved_response_key(&q(&[("appId", "acme"), ("state", "x"), ("code", "y")])),
			Some("state")
		);
		assert_eq!(reserved_response_key(&q(&[("appId", "acme"), ("lang", "en")])), None);
	}

	#[test]
	fn callback_query_drops_oauth_response_keys() {
		let params = CallbackParams::from_callback_query(q(&[
			("appId", "acme"),
			("lang", "en"),
			("code", "abc"),
			("state", "xyz"),
			("scope", "email openid"),
			("authuser", "0"),
			("prompt", "consent"),
		]));
		assert_eq!(params.pairs(), q(&[("appId", "acme"), ("lang", "en")]).as_slice());
	}

	#[test]
	fn redirect_uri_appends_params() {
		let params = CallbackParams::from_authorize_query(q(&[("appId", "acme"), ("next", "/a b")]));
		let uri = params
			.redirect_uri("https://auth.example.com/auth/callback/google")
			.unwrap();
		assert_eq!(
			uri,
			"https://auth.example.com/auth/callback/google?appId=acme&next=%2Fa+b"
		);
	}

	#[test]
	fn template_query_is_kept_and_not_duplicated() {
		let template = "https://auth.example.com/cb?tenant=fixed";
		let authorize = CallbackParams::from_authorize_query(q(&[("appId", "acme")]));
		let sent = authorize.redirect_uri(template).unwrap();
		assert_eq!(sent, "https://auth.example.com/cb?tenant=fixed&appId=acme");

		// The provider echoes the whole query back plus its own keys.
		let callback = CallbackParams::from_callback_query(q(&[
			("tenant", "fixed"),
			("appId", "acme"),
			("code", "c"),
		]));
		assert_eq!(callback.redirect_uri(template).unwrap(), sent);
	}

	#[test]
	fn empty_params_leave_template_untouched() {
		let uri = CallbackParams::default()
			.redirect_uri("https://auth.example.com/cb")
			.unwrap();
		assert_eq!(uri, "https://auth.example.com/cb");
	}

	#[test]
	fn bad_template_is_config_error() {
		let err = CallbackParams::default().redirect_uri("not a url").unwrap_err();
		assert!(matches!(err, ProviderError::InvalidConfig(_)));
	}

	proptest! {
		/// The callback side rebuilds the exact redirect URI sent at authorize time.
		#[test]
		fn callback_reconstruction_matches_authorize(
			extra in proptest::collection::vec(
				(
					prop_oneof![
						"[a-zA-Z][a-zA-Z0-9_]{0,8}",
						proptest::sample::select(OAUTH_RESPONSE_PARAMS).prop_map(str::to_string),
					],
					"[ -~]{0,12}",
				),
				0..5,
			),
			code in "[a-zA-Z0-9]{1,20}",
		) {
			let mut with_provider = vec![("appId".to_string(), "acme".to_string())];
			with_provider.extend(extra);
			with_provider.push(("provider".to_string(), "google".to_string()));

			let template = "https://auth.example.com/auth/callback/google";
			let sent = CallbackParams::from_authorize_query(with_provider)
				.redirect_uri(template)
				.unwrap();

			let mut echoed: Vec<(String, String)> = Url::parse(&sent)
				.unwrap()
				.query_pairs()
				.map(|(k, v)| (k.into_owned(), v.into_owned()))
				.collect();
			prop_assert!(echoed.iter().all(|(k, _)| is_forwarded(k)));
			echoed.push(("code".to_string(), code));
			echoed.push(("state".to_string(), "s".to_string()));

			let rebuilt = CallbackParams::from_callback_query(echoed)
				.redirect_uri(template)
				.unwrap();
			prop_assert_eq!(rebuilt, sent);
		}
	}
}
