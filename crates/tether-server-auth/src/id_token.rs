// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ID-token verification against a provider JWKS.
//!
//! The key set is cached per verifier and refetched when it is older than
//! the TTL or when a token names an unknown `kid` (key rotation). The cache
//! lock is never held across an await.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::error::ProviderError;
use crate::identity::{split_display_name, NormalizedIdentity};

const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(600);
const LEEWAY_SECS: u64 = 60;

/// Claims read from a verified ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
	pub sub: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default, deserialize_with = "deserialize_flexible_bool")]
	pub email_verified: Option<bool>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub given_name: Option<String>,
	#[serde(default)]
	pub family_name: Option<String>,
	#[serde(default)]
	pub picture: Option<String>,
}

impl IdTokenClaims {
	/// Map to a [`NormalizedIdentity`]; an email claim is required.
	pub fn into_identity(self, stage: &'static str) -> Result<NormalizedIdentity, ProviderError> {
		let email = self
			.email
			.filter(|e| !e.trim().is_empty())
			.ok_or_else(|| ProviderError::Parse {
				stage,
				message: "identity has no email claim".to_string(),
			})?;
		let name = self.name.unwrap_or_default();
		let (derived_given, derived_family) = split_display_name(&name);

		Ok(NormalizedIdentity {
			sub: self.sub,
			given_name: self.given_name.unwrap_or(derived_given),
			family_name: self.family_name.unwrap_or(derived_family),
			name,
			picture: self.picture,
			email,
			email_verified: self.email_verified.unwrap_or(false),
		})
	}
}

/// Accepts `true`, `"true"` and friends; some providers send strings.
pub fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Flexible {
		Bool(bool),
		Text(String),
	}

	Ok(match Option::<Flexible>::deserialize(deserializer)? {
		Some(Flexible::Bool(b)) => Some(b),
		Some(Flexible::Text(s)) => Some(s.eq_ignore_ascii_case("true")),
		None => None,
	})
}

struct CachedJwks {
	keys: JwkSet,
	fetched_at: Instant,
}

/// Verifies RS/ES-signed ID tokens for one provider.
pub struct IdTokenVerifier {
	http: Client,
	jwks_url: String,
	ttl: Duration,
	cache: RwLock<Option<CachedJwks>>,
}

impl std::fmt::Debug for IdTokenVerifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdTokenVerifier")
			.field("jwks_url", &self.jwks_url)
			.field("ttl", &self.ttl)
			.finish()
	}
}

impl IdTokenVerifier {
	pub fn new(http: Client, jwks_url: impl Into<String>) -> Self {
		Self {
			http,
			jwks_url: jwks_url.into(),
			ttl: DEFAULT_JWKS_TTL,
			cache: RwLock::new(None),
		}
	}

	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn jwks_url(&self) -> &str {
		&self.jwks_url
	}

	/// Verify signature, expiry, audience (`audience`) and, when `issuers` is
	/// non-empty, the issuer.
	#[tracing::instrument(skip(self, token), fields(jwks_url = %self.jwks_url))]
	pub async fn verify(
		&self,
		token: &str,
		audience: &str,
		issuers: &[String],
	) -> Result<IdTokenClaims, ProviderError> {
		let header = decode_header(token)
			.map_err(|e| ProviderError::InvalidIdToken(format!("malformed header: {e}")))?;

		if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
			return Err(ProviderError::InvalidIdToken(format!(
				"symmetric algorithm {:?} is not accepted",
				header.alg
			)));
		}

		let kid = header.kid.as_deref();
		let key = match self.cached_key(kid) {
			Some(key) => key,
			None => {
				tracing::debug!(kid = ?kid, "JWKS cache miss, fetching key set");
				let keys = self.fetch_jwks().await?;
				let key = find_key(&keys, kid);
				self.store(keys);
				key.ok_or_else(|| {
					ProviderError::InvalidIdToken(format!("no JWKS key matches kid {kid:?}"))
				})?
			}
		};

		let decoding_key = DecodingKey::from_jwk(&key)
			.map_err(|e| ProviderError::InvalidIdToken(format!("unusable JWKS key: {e}")))?;

		let mut validation = Validation::new(header.alg);
		validation.set_audience(&[audience]);
		if !issuers.is_empty() {
			validation.set_issuer(issuers);
		}
		validation.leeway = LEEWAY_SECS;

		let data = decode::<IdTokenClaims>(token, &decoding_key, &validation)
			.map_err(|e| ProviderError::InvalidIdToken(e.to_string()))?;
		tracing::debug!("ID token verified");
		Ok(data.claims)
	}

	fn cached_key(&self, kid: Option<&str>) -> Option<jsonwebtoken::jwk::Jwk> {
		let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
		let cached = guard.as_ref()?;
		if cached.fetched_at.elapsed() > self.ttl {
			return None;
		}
		find_key(&cached.keys, kid)
	}

	fn store(&self, keys: JwkSet) {
		let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
		*guard = Some(CachedJwks {
			keys,
			fetched_at: Instant::now(),
		});
	}

	async fn fetch_jwks(&self) -> Result<JwkSet, ProviderError> {
		let response = self
			.http
			.get(&self.jwks_url)
			.header("Accept", "application/json")
			.send()
			.await
			.map_err(|source| ProviderError::Transport {
				stage: "jwks",
				source,
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::warn!(status = status.as_u16(), "JWKS fetch failed");
			return Err(ProviderError::upstream("jwks", status.as_u16(), &body));
		}

		response.json().await.map_err(|e| ProviderError::Parse {
			stage: "jwks",
			message: e.to_string(),
		})
	}
}

fn find_key(keys: &JwkSet, kid: Option<&str>) -> Option<jsonwebtoken::jwk::Jwk> {
	match kid {
		Some(kid) => keys.find(kid).cloned(),
		None if keys.keys.len() == 1 => keys.keys.first().cloned(),
		None => None,
	}
}
