// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener configuration.

use serde::Deserialize;

const DEFAULT_PORT: u16 = 8080;

/// HTTP listener configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// Public origin of the broker, used in logs and as the default for
	/// provider redirect templates in documentation.
	pub base_url: String,
}

impl Default for HttpConfig {
	fn default() -> Self {
		HttpConfigLayer::default().finalize()
	}
}

/// HTTP configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub base_url: Option<String>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: HttpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
	}

	pub fn finalize(self) -> HttpConfig {
		let port = self.port.unwrap_or(DEFAULT_PORT);
		HttpConfig {
			host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
			port,
			base_url: self
				.base_url
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or_else(|| format!("http://localhost:{port}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = HttpConfig::default();
		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 8080);
		assert_eq!(config.base_url, "http://localhost:8080");
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = HttpConfigLayer {
			host: Some("127.0.0.1".to_string()),
			port: Some(3000),
			base_url: None,
		};
		base.merge(HttpConfigLayer {
			host: None,
			port: Some(9000),
			base_url: Some("https://auth.example.com/".to_string()),
		});
		let config = base.finalize();
		assert_eq!(config.host, "127.0.0.1");
		assert_eq!(config.port, 9000);
		assert_eq!(config.base_url, "https://auth.example.com");
	}

	#[test]
	fn test_base_url_follows_port() {
		let config = HttpConfigLayer {
			port: Some(9090),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.base_url, "http://localhost:9090");
	}
}
