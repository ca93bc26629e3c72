// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provider contract for Tether.
//!
//! Every provider family (Google, GitLab, generic OpenID) implements
//! [`IdentityProvider`]. The server builds one adapter per provider-flagged
//! registry record and dispatches through a [`ProviderRegistry`].
//!
//! # Flow
//!
//! 1. [`IdentityProvider::authorization_url`]: provider endpoint plus
//!    `client_id`, `redirect_uri`, `response_type=code` and `scope`. The
//!    redirect URI is the configured template with the inbound authorize
//!    parameters appended (see [`CallbackParams`]).
//! 2. [`IdentityProvider::exchange_code`]: POST the code to the token
//!    endpoint with the identical redirect URI, then read the identity from
//!    the user-info endpoint or a verified ID token, and map it to a
//!    [`NormalizedIdentity`].
//!
//! Client secrets, access tokens and ID tokens are wrapped in
//! `SecretString`; tracing instrumentation skips codes and tokens.

mod callback;
mod config;
mod error;
mod id_token;
mod identity;
mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use callback::{reserved_response_key, CallbackParams, OAUTH_RESPONSE_PARAMS, PROVIDER_PARAM};
pub use config::OAuthClientConfig;
pub use error::ProviderError;
pub use id_token::{deserialize_flexible_bool, IdTokenClaims, IdTokenVerifier};
pub use identity::{normalize_email, split_display_name, NormalizedIdentity};
pub use token::{exchange_authorization_code, fetch_with_bearer, TokenResponse};

/// A third-party identity provider adapter.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Registry id of the provider this adapter serves.
	fn provider_id(&self) -> &str;

	/// Family name (`google`, `gitlab`, `oidc`).
	fn family(&self) -> &'static str;

	/// URL the browser is redirected to for consent.
	fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError>;

	/// Exchange an authorization code for the caller's identity.
	///
	/// `params` are the reconstructed passthrough parameters, used to rebuild
	/// the redirect URI sent at authorize time.
	async fn exchange_code(
		&self,
		code: &str,
		params: &CallbackParams,
	) -> Result<NormalizedIdentity, ProviderError>;
}

/// Registration map from provider id to adapter, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
	adapters: BTreeMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an adapter under its provider id, replacing any previous one.
	pub fn register(&mut self, adapter: Arc<dyn IdentityProvider>) {
		tracing::debug!(
			provider_id = adapter.provider_id(),
			family = adapter.family(),
			"registered identity provider adapter"
		);
		self.adapters
			.insert(adapter.provider_id().to_string(), adapter);
	}

	pub fn get(&self, provider_id: &str) -> Option<Arc<dyn IdentityProvider>> {
		self.adapters.get(provider_id).cloned()
	}

	pub fn contains(&self, provider_id: &str) -> bool {
		self.adapters.contains_key(provider_id)
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.adapters.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.adapters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.adapters.is_empty()
	}
}

impl fmt::Debug for ProviderRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderRegistry")
			.field("providers", &self.adapters.keys().collect::<Vec<_>>())
			.finish()
	}
}
