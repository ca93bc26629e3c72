// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::path::PathBuf;

use tether_common_secret::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, HttpConfigLayer, LinkingConfigLayer, LogFormat, LoggingConfigLayer,
	UpstreamConfigLayer,
};

/// Default location of the server TOML file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tether/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(
			apps = layer.apps.as_ref().map(|a| a.len()).unwrap_or(0),
			"parsed config layer from TOML"
		);
		Ok(layer)
	}
}

/// Environment variable source for the server sections.
///
/// Convention: TETHER_SERVER_<FIELD>. Per-app overrides (`<ID>__<FIELD>`)
/// are applied later, once the app set is known.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: env_var("TETHER_SERVER_HOST"),
				port: env_u16("TETHER_SERVER_PORT")?,
				base_url: env_var("TETHER_SERVER_BASE_URL"),
			}),
			database: Some(DatabaseConfigLayer {
				url: env_var("TETHER_SERVER_DATABASE_URL"),
			}),
			logging: Some(load_logging_from_env()?),
			upstream: Some(UpstreamConfigLayer {
				provider_timeout_secs: env_u64("TETHER_SERVER_PROVIDER_TIMEOUT_SECS")?,
				account_timeout_secs: env_u64("TETHER_SERVER_ACCOUNT_TIMEOUT_SECS")?,
			}),
			linking: Some(LinkingConfigLayer {
				ticket_ttl_secs: env_u64("TETHER_SERVER_LINK_TICKET_TTL_SECS")?,
			}),
			apps: None,
		})
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("TETHER_SERVER_LOG_FORMAT") {
		Some(v) => Some(LogFormat::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "TETHER_SERVER_LOG_FORMAT".to_string(),
			message: format!("expected 'pretty' or 'json', got '{v}'"),
		})?),
		None => None,
	};
	Ok(LoggingConfigLayer {
		level: env_var("TETHER_SERVER_LOG_LEVEL"),
		format,
	})
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Load a secret from `VAR`, or from the file named by `VAR_FILE`.
///
/// The `_FILE` variant wins when both are set; a single trailing newline in
/// the file is stripped.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{name}_FILE");
	if let Some(path) = env_var(&file_var) {
		let content = std::fs::read_to_string(&path)
			.map_err(|e| ConfigError::Secret(format!("{file_var}: cannot read {path}: {e}")))?;
		let value = content
			.strip_suffix('\n')
			.map(|v| v.strip_suffix('\r').unwrap_or(v))
			.unwrap_or(&content)
			.to_string();
		return Ok(Some(SecretString::new(value)));
	}
	Ok(env_var(name).map(SecretString::new))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn precedence_orders_sources() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn missing_toml_file_is_skipped() {
		let layer = TomlSource::new("/nonexistent/tether/server.toml")
			.load()
			.unwrap();
		assert!(layer.http.is_none());
		assert!(layer.apps.is_none());
	}

	#[test]
	fn toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[http]
port = 9001

[logging]
format = "json"

[apps.acme]
account_api_url = "https://acme.example.com"
account_api_key = "k"
app_url = "https://acme.example.com"
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.http.unwrap().port, Some(9001));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert!(layer.apps.unwrap().contains_key("acme"));
	}

	#[test]
	fn malformed_toml_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[http\nport = ").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn secret_file_strips_trailing_newline() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "ticket-key").unwrap();
		std::env::set_var("TETHER_TEST_SECRET_A_FILE", file.path());
		let secret = load_secret_env("TETHER_TEST_SECRET_A").unwrap().unwrap();
		std::env::remove_var("TETHER_TEST_SECRET_A_FILE");
		assert_eq!(secret.expose(), "ticket-key");
	}

	#[test]
	fn secret_falls_back_to_plain_variable() {
		std::env::set_var("TETHER_TEST_SECRET_B", "inline");
		let secret = load_secret_env("TETHER_TEST_SECRET_B").unwrap().unwrap();
		std::env::remove_var("TETHER_TEST_SECRET_B");
		assert_eq!(secret.expose(), "inline");
		assert!(load_secret_env("TETHER_TEST_SECRET_UNSET").unwrap().is_none());
	}

	#[test]
	fn unreadable_secret_file_is_an_error() {
		std::env::set_var("TETHER_TEST_SECRET_C_FILE", "/nonexistent/secret");
		let err = load_secret_env("TETHER_TEST_SECRET_C").unwrap_err();
		std::env::remove_var("TETHER_TEST_SECRET_C_FILE");
		assert!(matches!(err, ConfigError::Secret(_)));
	}
}
