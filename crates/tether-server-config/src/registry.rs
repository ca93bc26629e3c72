// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant and identity-provider registry.
//!
//! Every record lives under `[apps.<id>]` in the server TOML file. A record
//! is either a tenant (a first-party application whose accounts live in an
//! external system of record) or, when `is_provider = true`, an identity
//! provider. The two roles are exclusive.
//!
//! Environment variables named `<ID>__<FIELD>` override file values; the id
//! is compared case-insensitively against the upper-cased app id and the
//! field name case-insensitively against the known field set. When
//! `TETHER_APPLICATIONS=id[:name],...` is set only the listed apps load.
//!
//! The registry is built once at startup and never mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tether_common_secret::SecretString;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Environment variable restricting which apps are loaded.
pub const APPLICATIONS_ENV: &str = "TETHER_APPLICATIONS";

pub const DEFAULT_LINK_FIELDS: &[&str] = &["email", "password"];
pub const DEFAULT_RESOLVE_ROUTE: &str = "/accounts/resolve";
pub const DEFAULT_TOKEN_ROUTE: &str = "/accounts/{accountId}/token";

// =============================================================================
// Errors
// =============================================================================

/// Which side of the broker a registry record plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Tenant,
	Provider,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Tenant => f.write_str("tenant"),
			Role::Provider => f.write_str("identity provider"),
		}
	}
}

/// Lookup failures. `context` names the caller so the message pinpoints
/// which identifier was wrong where.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("{context}: unknown {}: {id}", lookup_target(.expected))]
	NotFound {
		id: String,
		context: String,
		/// Role the caller asked for; `None` for role-agnostic lookups.
		expected: Option<Role>,
	},

	#[error("{context}: '{id}' is configured as a {actual}, not a {expected}")]
	RoleMismatch {
		id: String,
		context: String,
		expected: Role,
		actual: Role,
	},
}

fn lookup_target(expected: &Option<Role>) -> &'static str {
	match expected {
		Some(Role::Tenant) => "tenant",
		Some(Role::Provider) => "identity provider",
		None => "application id",
	}
}

// =============================================================================
// Resolved records
// =============================================================================

/// Identity-provider family, which selects the adapter implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
	Google,
	GitLab,
	Oidc,
	/// Declared but without a built-in adapter.
	Other(String),
}

impl ProviderFamily {
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"google" => ProviderFamily::Google,
			"gitlab" => ProviderFamily::GitLab,
			"oidc" | "openid" | "openid-connect" => ProviderFamily::Oidc,
			other => ProviderFamily::Other(other.to_string()),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			ProviderFamily::Google => "google",
			ProviderFamily::GitLab => "gitlab",
			ProviderFamily::Oidc => "oidc",
			ProviderFamily::Other(name) => name,
		}
	}
}

impl fmt::Display for ProviderFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A third-party identity provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
	pub id: String,
	pub name: String,
	pub family: ProviderFamily,
	pub client_id: String,
	pub client_secret: SecretString,
	/// `None` falls back to the family's well-known endpoint.
	pub authorize_url: Option<String>,
	pub token_url: Option<String>,
	/// Callback URL registered with the provider; inbound authorize query
	/// parameters are appended to it.
	pub redirect_url: String,
	pub scope: Option<String>,
	pub userinfo_url: Option<String>,
	pub jwks_url: Option<String>,
	pub issuer: Option<String>,
}

/// A first-party application and its system-of-record contract.
#[derive(Debug, Clone)]
pub struct TenantConfig {
	pub id: String,
	pub name: String,
	pub account_api_url: String,
	pub account_api_key: SecretString,
	/// Base URL the browser is sent to with `/?_token=...` once a token exists.
	pub app_url: String,
	/// Ordered credential fields required to resolve an account.
	pub link_fields: Vec<String>,
	pub resolve_route: String,
	/// May contain an `{accountId}` placeholder.
	pub token_route: String,
}

#[derive(Debug, Clone)]
pub enum AppConfig {
	Tenant(Arc<TenantConfig>),
	Provider(Arc<ProviderConfig>),
}

impl AppConfig {
	pub fn id(&self) -> &str {
		match self {
			AppConfig::Tenant(t) => &t.id,
			AppConfig::Provider(p) => &p.id,
		}
	}

	pub fn role(&self) -> Role {
		match self {
			AppConfig::Tenant(_) => Role::Tenant,
			AppConfig::Provider(_) => Role::Provider,
		}
	}
}

// =============================================================================
// Layer (file + environment)
// =============================================================================

/// One `[apps.<id>]` record before validation. All fields optional so file
/// and environment values can be merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfigLayer {
	#[serde(default, alias = "app_name")]
	pub name: Option<String>,
	#[serde(default)]
	pub is_provider: Option<bool>,

	#[serde(default)]
	pub family: Option<String>,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<SecretString>,
	#[serde(default)]
	pub authorize_url: Option<String>,
	#[serde(default)]
	pub token_url: Option<String>,
	#[serde(default)]
	pub redirect_url: Option<String>,
	#[serde(default)]
	pub scope: Option<String>,
	#[serde(default)]
	pub userinfo_url: Option<String>,
	#[serde(default)]
	pub jwks_url: Option<String>,
	#[serde(default)]
	pub issuer: Option<String>,

	#[serde(default)]
	pub account_api_url: Option<String>,
	#[serde(default)]
	pub account_api_key: Option<SecretString>,
	#[serde(default)]
	pub app_url: Option<String>,
	#[serde(default, deserialize_with = "deserialize_link_fields")]
	pub link_fields: Option<Vec<String>>,
	#[serde(default)]
	pub resolve_route: Option<String>,
	#[serde(default)]
	pub token_route: Option<String>,
}

macro_rules! merge_fields {
	($target:expr, $other:expr, $($field:ident),+ $(,)?) => {
		$(
			if $other.$field.is_some() {
				$target.$field = $other.$field;
			}
		)+
	};
}

impl AppConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: AppConfigLayer) {
		merge_fields!(
			self,
			other,
			name,
			is_provider,
			family,
			client_id,
			client_secret,
			authorize_url,
			token_url,
			redirect_url,
			scope,
			userinfo_url,
			jwks_url,
			issuer,
			account_api_url,
			account_api_key,
			app_url,
			link_fields,
			resolve_route,
			token_route,
		);
	}

	/// Set a field by its (case-insensitive) name. Returns `Ok(false)` for
	/// names that are not app fields.
	pub fn set_field(&mut self, field: &str, value: String, key: &str) -> Result<bool, ConfigError> {
		match field.to_ascii_lowercase().as_str() {
			"name" | "app_name" | "appname" => self.name = Some(value),
			"is_provider" | "isprovider" => self.is_provider = Some(parse_bool(key, &value)?),
			"family" => self.family = Some(value),
			"client_id" => self.client_id = Some(value),
			"client_secret" => self.client_secret = Some(SecretString::new(value)),
			"authorize_url" => self.authorize_url = Some(value),
			"token_url" => self.token_url = Some(value),
			"redirect_url" => self.redirect_url = Some(value),
			"scope" => self.scope = Some(value),
			"userinfo_url" => self.userinfo_url = Some(value),
			"jwks_url" => self.jwks_url = Some(value),
			"issuer" => self.issuer = Some(value),
			"account_api_url" => self.account_api_url = Some(value),
			"account_api_key" => self.account_api_key = Some(SecretString::new(value)),
			"app_url" => self.app_url = Some(value),
			"link_fields" => self.link_fields = Some(parse_link_fields(&value)),
			"resolve_route" => self.resolve_route = Some(value),
			"token_route" => self.token_route = Some(value),
			_ => return Ok(false),
		}
		Ok(true)
	}

	fn declares_provider_fields(&self) -> Option<&'static str> {
		if self.client_id.is_some() {
			Some("client_id")
		} else if self.client_secret.is_some() {
			Some("client_secret")
		} else if self.redirect_url.is_some() {
			Some("redirect_url")
		} else {
			None
		}
	}

	fn declares_tenant_fields(&self) -> Option<&'static str> {
		if self.account_api_url.is_some() {
			Some("account_api_url")
		} else if self.account_api_key.is_some() {
			Some("account_api_key")
		} else if self.app_url.is_some() {
			Some("app_url")
		} else {
			None
		}
	}

	/// Validate and resolve the record into its role.
	pub fn finalize(self, id: &str) -> Result<AppConfig, ConfigError> {
		let name = non_empty(self.name.clone()).unwrap_or_else(|| id.to_string());

		if self.is_provider.unwrap_or(false) {
			if let Some(field) = self.declares_tenant_fields() {
				return Err(ConfigError::Validation(format!(
					"app '{id}' is an identity provider but declares tenant field '{field}'"
				)));
			}
			let client_secret = self
				.client_secret
				.filter(|s| !s.is_blank())
				.ok_or_else(|| missing(id, "client_secret"))?;
			let family = self
				.family
				.as_deref()
				.map(ProviderFamily::parse)
				.unwrap_or_else(|| ProviderFamily::parse(id));

			Ok(AppConfig::Provider(Arc::new(ProviderConfig {
				id: id.to_string(),
				name,
				family,
				client_id: non_empty(self.client_id).ok_or_else(|| missing(id, "client_id"))?,
				client_secret,
				authorize_url: non_empty(self.authorize_url),
				token_url: non_empty(self.token_url),
				redirect_url: non_empty(self.redirect_url)
					.ok_or_else(|| missing(id, "redirect_url"))?,
				scope: non_empty(self.scope),
				userinfo_url: non_empty(self.userinfo_url),
				jwks_url: non_empty(self.jwks_url),
				issuer: non_empty(self.issuer),
			})))
		} else {
			if let Some(field) = self.declares_provider_fields() {
				return Err(ConfigError::Validation(format!(
					"app '{id}' declares provider field '{field}' but is not flagged is_provider = true"
				)));
			}
			let link_fields = match self.link_fields {
				Some(fields) if fields.is_empty() => {
					return Err(ConfigError::Validation(format!(
						"app '{id}': link_fields cannot be empty"
					)));
				}
				Some(fields) => fields,
				None => DEFAULT_LINK_FIELDS.iter().map(|f| f.to_string()).collect(),
			};
			let account_api_key = self
				.account_api_key
				.filter(|s| !s.is_blank())
				.ok_or_else(|| missing(id, "account_api_key"))?;

			Ok(AppConfig::Tenant(Arc::new(TenantConfig {
				id: id.to_string(),
				name,
				account_api_url: non_empty(self.account_api_url)
					.map(|url| url.trim_end_matches('/').to_string())
					.ok_or_else(|| missing(id, "account_api_url"))?,
				account_api_key,
				app_url: non_empty(self.app_url).ok_or_else(|| missing(id, "app_url"))?,
				link_fields,
				resolve_route: route(self.resolve_route, DEFAULT_RESOLVE_ROUTE),
				token_route: route(self.token_route, DEFAULT_TOKEN_ROUTE),
			})))
		}
	}
}

fn missing(id: &str, field: &str) -> ConfigError {
	ConfigError::Validation(format!("app '{id}' is missing required field '{field}'"))
}

fn non_empty(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}

fn route(value: Option<String>, default: &str) -> String {
	match non_empty(value) {
		Some(r) if r.starts_with('/') => r,
		Some(r) => format!("/{r}"),
		None => default.to_string(),
	}
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" => Ok(true),
		"false" | "0" | "no" => Ok(false),
		_ => Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("invalid boolean '{value}'"),
		}),
	}
}

/// Split a comma-separated field list, dropping blanks.
pub fn parse_link_fields(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(|f| f.trim().to_string())
		.filter(|f| !f.is_empty())
		.collect()
}

fn deserialize_link_fields<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Fields {
		List(Vec<String>),
		Csv(String),
	}

	Ok(match Option::<Fields>::deserialize(deserializer)? {
		Some(Fields::List(list)) => Some(
			list.into_iter()
				.map(|f| f.trim().to_string())
				.filter(|f| !f.is_empty())
				.collect(),
		),
		Some(Fields::Csv(csv)) => Some(parse_link_fields(&csv)),
		None => None,
	})
}

/// Restrict `apps` to the entries listed in a `TETHER_APPLICATIONS` value.
///
/// Listed ids missing from the file start from an empty record so the
/// environment can define them entirely.
pub fn select_applications(
	mut apps: BTreeMap<String, AppConfigLayer>,
	selection: Option<&str>,
) -> BTreeMap<String, AppConfigLayer> {
	let Some(selection) = selection.filter(|s| !s.trim().is_empty()) else {
		return apps;
	};

	let mut selected = BTreeMap::new();
	for entry in selection.split(',') {
		let (id, name) = match entry.split_once(':') {
			Some((id, name)) => (id.trim(), Some(name.trim())),
			None => (entry.trim(), None),
		};
		if id.is_empty() {
			continue;
		}
		let mut layer = apps.remove(id).unwrap_or_default();
		if let Some(name) = name.filter(|n| !n.is_empty()) {
			layer.name = Some(name.to_string());
		}
		selected.insert(id.to_string(), layer);
	}

	if !apps.is_empty() {
		debug!(
			skipped = ?apps.keys().collect::<Vec<_>>(),
			"apps not listed in {APPLICATIONS_ENV} were skipped"
		);
	}
	selected
}

/// Apply `<ID>__<FIELD>` overrides from `vars` to the matching apps.
pub fn apply_env_overrides<I>(
	apps: &mut BTreeMap<String, AppConfigLayer>,
	vars: I,
) -> Result<(), ConfigError>
where
	I: IntoIterator<Item = (String, String)>,
{
	for (key, value) in vars {
		if value.is_empty() {
			continue;
		}
		let Some((prefix, field)) = key.split_once("__") else {
			continue;
		};
		for (id, layer) in apps.iter_mut() {
			if !id.eq_ignore_ascii_case(prefix) {
				continue;
			}
			if layer.set_field(field, value.clone(), &key)? {
				debug!(app = %id, field = %field.to_ascii_lowercase(), "applied environment override");
			} else {
				warn!(app = %id, variable = %key, "ignoring override for unknown app field");
			}
		}
	}
	Ok(())
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable lookup table of tenants and providers.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	apps: HashMap<String, AppConfig>,
}

impl Registry {
	/// Build from merged layers, validating every record.
	pub fn from_layers(apps: BTreeMap<String, AppConfigLayer>) -> Result<Self, ConfigError> {
		let mut resolved = HashMap::with_capacity(apps.len());
		for (id, layer) in apps {
			let id = id.trim().to_string();
			if id.is_empty() {
				return Err(ConfigError::Validation("app id cannot be empty".to_string()));
			}
			let app = layer.finalize(&id)?;
			debug!(app = %id, role = %app.role(), "registered app");
			resolved.insert(id, app);
		}
		Ok(Self { apps: resolved })
	}

	pub fn resolve(&self, id: &str, context: &str) -> Result<&AppConfig, RegistryError> {
		self.lookup(id, context, None)
	}

	fn lookup(
		&self,
		id: &str,
		context: &str,
		expected: Option<Role>,
	) -> Result<&AppConfig, RegistryError> {
		self.apps.get(id).ok_or_else(|| RegistryError::NotFound {
			id: id.to_string(),
			context: context.to_string(),
			expected,
		})
	}

	/// Resolve `id` and require it to be a tenant.
	pub fn tenant(&self, id: &str, context: &str) -> Result<Arc<TenantConfig>, RegistryError> {
		match self.lookup(id, context, Some(Role::Tenant))? {
			AppConfig::Tenant(tenant) => Ok(Arc::clone(tenant)),
			AppConfig::Provider(_) => Err(RegistryError::RoleMismatch {
				id: id.to_string(),
				context: context.to_string(),
				expected: Role::Tenant,
				actual: Role::Provider,
			}),
		}
	}

	/// Resolve `id` and require it to be an identity provider.
	pub fn provider(&self, id: &str, context: &str) -> Result<Arc<ProviderConfig>, RegistryError> {
		match self.lookup(id, context, Some(Role::Provider))? {
			AppConfig::Provider(provider) => Ok(Arc::clone(provider)),
			AppConfig::Tenant(_) => Err(RegistryError::RoleMismatch {
				id: id.to_string(),
				context: context.to_string(),
				expected: Role::Provider,
				actual: Role::Tenant,
			}),
		}
	}

	pub fn tenants(&self) -> impl Iterator<Item = &Arc<TenantConfig>> {
		self.apps.values().filter_map(|app| match app {
			AppConfig::Tenant(t) => Some(t),
			AppConfig::Provider(_) => None,
		})
	}

	pub fn providers(&self) -> impl Iterator<Item = &Arc<ProviderConfig>> {
		self.apps.values().filter_map(|app| match app {
			AppConfig::Provider(p) => Some(p),
			AppConfig::Tenant(_) => None,
		})
	}

	pub fn len(&self) -> usize {
		self.apps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.apps.is_empty()
	}
}
