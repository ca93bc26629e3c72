// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Link ticket settings.

use serde::Deserialize;
use tether_common_secret::SecretString;

const DEFAULT_TICKET_TTL_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct LinkingConfig {
	/// How long a callback's link ticket stays valid for `POST /link-account`.
	pub ticket_ttl_secs: u64,
	/// HMAC key for link tickets. `None` makes the server generate one per process.
	pub ticket_secret: Option<SecretString>,
}

impl Default for LinkingConfig {
	fn default() -> Self {
		LinkingConfigLayer::default().finalize(None)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkingConfigLayer {
	#[serde(default)]
	pub ticket_ttl_secs: Option<u64>,
}

impl LinkingConfigLayer {
	pub fn merge(&mut self, other: LinkingConfigLayer) {
		if other.ticket_ttl_secs.is_some() {
			self.ticket_ttl_secs = other.ticket_ttl_secs;
		}
	}

	pub fn finalize(self, ticket_secret: Option<SecretString>) -> LinkingConfig {
		LinkingConfig {
			ticket_ttl_secs: self
				.ticket_ttl_secs
				.unwrap_or(DEFAULT_TICKET_TTL_SECS)
				.max(1),
			ticket_secret: ticket_secret.filter(|s| !s.is_blank()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = LinkingConfig::default();
		assert_eq!(config.ticket_ttl_secs, 900);
		assert!(config.ticket_secret.is_none());
	}

	#[test]
	fn test_blank_secret_is_ignored() {
		let config = LinkingConfigLayer::default().finalize(Some(SecretString::from("  ")));
		assert!(config.ticket_secret.is_none());
	}
}
