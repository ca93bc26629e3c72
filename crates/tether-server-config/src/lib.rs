// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server configuration for Tether.
//!
//! Configuration is assembled from layered sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`/etc/tether/server.toml` or `--config`)
//! 3. `TETHER_SERVER_*` environment variables
//!
//! The `[apps.<id>]` tables of the file become the [`Registry`] of tenants
//! and identity providers, after `TETHER_APPLICATIONS` selection and
//! `<ID>__<FIELD>` overrides.

mod error;
mod layer;
pub mod registry;
mod sections;
mod sources;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tether_common_secret::SecretString;
use tracing::{debug, info};

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use registry::{
	AppConfig, AppConfigLayer, ProviderConfig, ProviderFamily, Registry, RegistryError, Role,
	TenantConfig,
};
pub use sections::*;
pub use sources::{
	load_secret_env, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource,
	SYSTEM_CONFIG_PATH,
};

/// Environment variable holding the link-ticket HMAC key (`_FILE` supported).
pub const LINK_TICKET_SECRET_ENV: &str = "TETHER_SERVER_LINK_TICKET_SECRET";

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub upstream: UpstreamConfig,
	pub linking: LinkingConfig,
	pub registry: Arc<Registry>,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
		format!("{}:{}", self.http.host, self.http.port)
			.parse()
			.map_err(|e| ConfigError::InvalidValue {
				key: "http.host".to_string(),
				message: format!("{e}"),
			})
	}
}

/// Load configuration from the system config file and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Parse a TOML document without consulting the process environment.
pub fn load_config_from_str(content: &str) -> Result<ServerConfig, ConfigError> {
	let layer: ServerConfigLayer =
		toml::from_str(content).map_err(|e| ConfigError::TomlParse {
			path: PathBuf::from("<inline>"),
			source: e,
		})?;
	finalize(layer, Vec::new(), None)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	let ticket_secret = load_secret_env(LINK_TICKET_SECRET_ENV)?;
	finalize(merged, std::env::vars().collect(), ticket_secret)
}

/// Resolve a merged layer. `env` supplies `TETHER_APPLICATIONS` and the
/// per-app overrides.
pub fn finalize(
	layer: ServerConfigLayer,
	env: Vec<(String, String)>,
	ticket_secret: Option<SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let upstream = layer.upstream.unwrap_or_default().finalize();
	let linking = layer.linking.unwrap_or_default().finalize(ticket_secret);

	let selection = env
		.iter()
		.find(|(k, _)| k == registry::APPLICATIONS_ENV)
		.map(|(_, v)| v.clone());
	let mut apps = registry::select_applications(layer.apps.unwrap_or_default(), selection.as_deref());
	registry::apply_env_overrides(&mut apps, env)?;
	let registry = Registry::from_layers(apps)?;

	if http.port == 0 {
		return Err(ConfigError::Validation("http.port cannot be 0".to_string()));
	}

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		tenants = registry.tenants().count(),
		providers = registry.providers().count(),
		ticket_secret_configured = linking.ticket_secret.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		logging,
		upstream,
		linking,
		registry: Arc::new(registry),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
[http]
host = "127.0.0.1"
port = 8181

[upstream]
provider_timeout_secs = 3

[apps.acme]
account_api_url = "https://acme.example.com/api"
account_api_key = "acme-key"
app_url = "https://acme.example.com"

[apps.gitlab]
is_provider = true
client_id = "gl"
client_secret = "gl-secret"
redirect_url = "https://auth.example.com/auth/callback/gitlab"
"#;

	#[test]
	fn defaults_without_apps() {
		let config = load_config_from_str("").unwrap();
		assert_eq!(config.http.port, 8080);
		assert_eq!(config.database.url, "sqlite:./tether.db");
		assert!(config.registry.is_empty());
		assert_eq!(config.linking.ticket_ttl_secs, 900);
	}

	#[test]
	fn parses_sections_and_registry() {
		let config = load_config_from_str(CONFIG).unwrap();
		assert_eq!(config.socket_addr().unwrap().port(), 8181);
		assert_eq!(config.upstream.provider_timeout_secs, 3);
		assert_eq!(config.registry.len(), 2);
		assert!(config.registry.tenant("acme", "test").is_ok());
	}

	#[test]
	fn env_selection_and_overrides_apply() {
		let layer: ServerConfigLayer = toml::from_str(CONFIG).unwrap();
		let env = vec![
			("TETHER_APPLICATIONS".to_string(), "gitlab:GitLab".to_string()),
			("GITLAB__CLIENT_ID".to_string(), "rotated".to_string()),
		];
		let config = finalize(layer, env, Some(SecretString::from("k"))).unwrap();
		assert_eq!(config.registry.len(), 1);
		let gitlab = config.registry.provider("gitlab", "test").unwrap();
		assert_eq!(gitlab.client_id, "rotated");
		assert_eq!(gitlab.name, "GitLab");
		assert!(config.linking.ticket_secret.is_some());
	}

	#[test]
	fn invalid_app_fails_load() {
		let err = load_config_from_str(
			r#"
[apps.acme]
app_url = "https://acme.example.com"
"#,
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn zero_port_is_rejected() {
		let err = load_config_from_str("[http]\nport = 0\n").unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}
}
