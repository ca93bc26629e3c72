// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timeouts for calls to identity providers and tenant account systems.

use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
	pub provider_timeout_secs: u64,
	pub account_timeout_secs: u64,
}

impl UpstreamConfig {
	pub fn provider_timeout(&self) -> Duration {
		Duration::from_secs(self.provider_timeout_secs)
	}

	pub fn account_timeout(&self) -> Duration {
		Duration::from_secs(self.account_timeout_secs)
	}
}

impl Default for UpstreamConfig {
	fn default() -> Self {
		UpstreamConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamConfigLayer {
	#[serde(default)]
	pub provider_timeout_secs: Option<u64>,
	#[serde(default)]
	pub account_timeout_secs: Option<u64>,
}

impl UpstreamConfigLayer {
	pub fn merge(&mut self, other: UpstreamConfigLayer) {
		if other.provider_timeout_secs.is_some() {
			self.provider_timeout_secs = other.provider_timeout_secs;
		}
		if other.account_timeout_secs.is_some() {
			self.account_timeout_secs = other.account_timeout_secs;
		}
	}

	/// Zero would disable the bound entirely; it is clamped to one second.
	pub fn finalize(self) -> UpstreamConfig {
		UpstreamConfig {
			provider_timeout_secs: self
				.provider_timeout_secs
				.unwrap_or(DEFAULT_TIMEOUT_SECS)
				.max(1),
			account_timeout_secs: self
				.account_timeout_secs
				.unwrap_or(DEFAULT_TIMEOUT_SECS)
				.max(1),
		}
	}
}
