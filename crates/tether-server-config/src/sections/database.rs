// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Link store database configuration.

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:./tether.db";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_url() {
		assert_eq!(DatabaseConfigLayer::default().finalize().url, "sqlite:./tether.db");
	}

	#[test]
	fn test_custom_url() {
		let config = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/tether/links.db".to_string()),
		}
		.finalize();
		assert_eq!(config.url, "sqlite:/var/lib/tether/links.db");
	}
}
