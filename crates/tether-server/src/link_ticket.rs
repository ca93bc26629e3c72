// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stateless link tickets.
//!
//! A callback that finds no link hands the front-end a ticket carrying the
//! verified identity. `POST /auth/link-account` must present it, so the
//! identity that gets linked is the one the provider vouched for and not
//! whatever the client claims.
//!
//! Format: `base64url(json claims) "." hex(hmac_sha256(key, first part))`.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tether_common_secret::{Secret, SecretString};
use tether_server_auth::NormalizedIdentity;

type HmacSha256 = Hmac<Sha256>;

const GENERATED_KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum LinkTicketError {
	#[error("ticket is malformed")]
	Malformed,

	#[error("ticket signature does not match")]
	BadSignature,

	#[error("ticket expired")]
	Expired,

	#[error("ticket was issued for a different provider or application")]
	WrongContext,

	#[error("failed to encode ticket: {0}")]
	Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicketClaims {
	provider_id: String,
	tenant_id: String,
	identity: NormalizedIdentity,
	/// Unix seconds.
	expires_at: i64,
}

/// Issues and verifies link tickets with one HMAC key.
pub struct LinkTicketSigner {
	key: Secret<Vec<u8>>,
	ttl: Duration,
}

impl LinkTicketSigner {
	pub fn new(secret: &SecretString, ttl: Duration) -> Self {
		Self {
			key: Secret::new(secret.expose().as_bytes().to_vec()),
			ttl,
		}
	}

	/// Signer with a random per-process key.
	pub fn generated(ttl: Duration) -> Self {
		let mut key = vec![0u8; GENERATED_KEY_LEN];
		rand::thread_rng().fill_bytes(&mut key);
		Self {
			key: Secret::new(key),
			ttl,
		}
	}

	/// Configured key if present, otherwise a generated one.
	pub fn from_config(secret: Option<&SecretString>, ttl_secs: u64) -> Self {
		let ttl = Duration::from_secs(ttl_secs);
		match secret {
			Some(secret) => Self::new(secret, ttl),
			None => {
				tracing::warn!(
					"no link ticket secret configured; generated a per-process key, tickets will not survive a restart or work across instances"
				);
				Self::generated(ttl)
			}
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	pub fn issue(
		&self,
		provider_id: &str,
		tenant_id: &str,
		identity: &NormalizedIdentity,
	) -> Result<String, LinkTicketError> {
		self.issue_at(provider_id, tenant_id, identity, Utc::now().timestamp())
	}

	fn issue_at(
		&self,
		provider_id: &str,
		tenant_id: &str,
		identity: &NormalizedIdentity,
		now: i64,
	) -> Result<String, LinkTicketError> {
		let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
		let claims = TicketClaims {
			provider_id: provider_id.to_string(),
			tenant_id: tenant_id.to_string(),
			identity: identity.clone(),
			expires_at: now.saturating_add(ttl),
		};
		let json = serde_json::to_vec(&claims).map_err(LinkTicketError::Encode)?;
		let body = URL_SAFE_NO_PAD.encode(json);
		let signature = hex::encode(self.mac(body.as_bytes())?.finalize().into_bytes());
		Ok(format!("{body}.{signature}"))
	}

	/// Check signature, expiry and context; return the carried identity.
	pub fn verify(
		&self,
		ticket: &str,
		provider_id: &str,
		tenant_id: &str,
	) -> Result<NormalizedIdentity, LinkTicketError> {
		self.verify_at(ticket, provider_id, tenant_id, Utc::now().timestamp())
	}

	fn verify_at(
		&self,
		ticket: &str,
		provider_id: &str,
		tenant_id: &str,
		now: i64,
	) -> Result<NormalizedIdentity, LinkTicketError> {
		let (body, signature) = ticket
			.trim()
			.split_once('.')
			.ok_or(LinkTicketError::Malformed)?;
		let signature = hex::decode(signature).map_err(|_| LinkTicketError::Malformed)?;

		self.mac(body.as_bytes())?
			.verify_slice(&signature)
			.map_err(|_| LinkTicketError::BadSignature)?;

		let json = URL_SAFE_NO_PAD
			.decode(body)
			.map_err(|_| LinkTicketError::Malformed)?;
		let claims: TicketClaims =
			serde_json::from_slice(&json).map_err(|_| LinkTicketError::Malformed)?;

		if claims.expires_at <= now {
			return Err(LinkTicketError::Expired);
		}
		if claims.provider_id != provider_id || claims.tenant_id != tenant_id {
			return Err(LinkTicketError::WrongContext);
		}
		Ok(claims.identity)
	}

	fn mac(&self, payload: &[u8]) -> Result<HmacSha256, LinkTicketError> {
		let mut mac =
			HmacSha256::new_from_slice(self.key.expose()).map_err(|_| LinkTicketError::BadSignature)?;
		mac.update(payload);
		Ok(mac)
	}
}
