// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state, adapter registration and the HTTP router.

use std::sync::Arc;

use axum::{
	routing::{get, post},
	Router,
};
use reqwest::Client;
use sqlx::SqlitePool;
use tether_server_account::AccountClient;
use tether_server_auth::{OAuthClientConfig, ProviderError, ProviderRegistry};
use tether_server_auth_gitlab::{GitLabOAuthConfig, GitLabProvider};
use tether_server_auth_google::{GoogleOAuthConfig, GoogleProvider};
use tether_server_auth_oidc::{OidcConfig, OidcProvider, OIDC_DEFAULT_SCOPES};
use tether_server_config::{ProviderConfig, ProviderFamily, Registry, ServerConfig};
use tether_server_db::LinkRepository;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ServerError, flow::LinkingFlow, link_ticket::LinkTicketSigner, routes};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub flow: LinkingFlow,
	pub registry: Arc<Registry>,
	pub providers: Arc<ProviderRegistry>,
	pub pool: SqlitePool,
}

/// Build the state from a migrated pool and loaded configuration.
pub fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> Result<AppState, ServerError> {
	let provider_http = tether_common_http::new_client_with_timeout(config.upstream.provider_timeout())
		.map_err(|e| ServerError::Internal(format!("failed to build provider HTTP client: {e}")))?;
	let account_http = tether_common_http::new_client_with_timeout(config.upstream.account_timeout())
		.map_err(|e| ServerError::Internal(format!("failed to build account HTTP client: {e}")))?;

	let providers = Arc::new(
		build_provider_registry(&config.registry, provider_http)
			.map_err(|e| ServerError::Internal(format!("invalid provider configuration: {e}")))?,
	);
	let tickets = Arc::new(LinkTicketSigner::from_config(
		config.linking.ticket_secret.as_ref(),
		config.linking.ticket_ttl_secs,
	));
	let flow = LinkingFlow::new(
		Arc::clone(&config.registry),
		Arc::clone(&providers),
		Arc::new(LinkRepository::new(pool.clone())),
		AccountClient::new(account_http),
		tickets,
	);

	tracing::info!(
		tenants = config.registry.tenants().count(),
		providers = config.registry.providers().count(),
		adapters = providers.len(),
		"application state ready"
	);

	Ok(AppState {
		flow,
		registry: Arc::clone(&config.registry),
		providers,
		pool,
	})
}

/// One adapter per provider-flagged record whose family has an implementation.
pub fn build_provider_registry(
	registry: &Registry,
	http: Client,
) -> Result<ProviderRegistry, ProviderError> {
	let mut providers = ProviderRegistry::new();
	for provider in registry.providers() {
		match &provider.family {
			ProviderFamily::Google => {
				let mut config = GoogleOAuthConfig::new(
					provider.client_id.clone(),
					provider.client_secret.clone(),
					provider.redirect_url.clone(),
				);
				apply_endpoint_overrides(&mut config.oauth, provider);
				if let Some(url) = &provider.jwks_url {
					config.jwks_url = url.clone();
				}
				if let Some(issuer) = &provider.issuer {
					config.issuers = vec![issuer.clone()];
				}
				providers.register(Arc::new(GoogleProvider::new(
					provider.id.clone(),
					config,
					http.clone(),
				)?));
			}
			ProviderFamily::GitLab => {
				let mut config = GitLabOAuthConfig::new(
					provider.client_id.clone(),
					provider.client_secret.clone(),
					provider.redirect_url.clone(),
				);
				apply_endpoint_overrides(&mut config.oauth, provider);
				if let Some(url) = &provider.userinfo_url {
					config.user_url = url.clone();
				}
				providers.register(Arc::new(GitLabProvider::new(
					provider.id.clone(),
					config,
					http.clone(),
				)?));
			}
			ProviderFamily::Oidc => {
				let (Some(authorize_url), Some(token_url)) =
					(&provider.authorize_url, &provider.token_url)
				else {
					return Err(ProviderError::InvalidConfig(format!(
						"provider '{}': OpenID providers need authorize_url and token_url",
						provider.id
					)));
				};
				let config = OidcConfig {
					oauth: OAuthClientConfig {
						client_id: provider.client_id.clone(),
						client_secret: provider.client_secret.clone(),
						authorize_url: authorize_url.clone(),
						token_url: token_url.clone(),
						redirect_url: provider.redirect_url.clone(),
						scopes: match &provider.scope {
							Some(scope) => OAuthClientConfig::parse_scopes(scope),
							None => OIDC_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
						},
					},
					userinfo_url: provider.userinfo_url.clone(),
					jwks_url: provider.jwks_url.clone(),
					issuer: provider.issuer.clone(),
				};
				providers.register(Arc::new(OidcProvider::new(
					provider.id.clone(),
					config,
					http.clone(),
				)?));
			}
			ProviderFamily::Other(family) => {
				tracing::warn!(
					provider_id = %provider.id,
					family = %family,
					"no adapter for provider family, provider left unregistered"
				);
			}
		}
	}
	Ok(providers)
}

fn apply_endpoint_overrides(oauth: &mut OAuthClientConfig, provider: &ProviderConfig) {
	if let Some(url) = &provider.authorize_url {
		oauth.authorize_url = url.clone();
	}
	if let Some(url) = &provider.token_url {
		oauth.token_url = url.clone();
	}
	if let Some(scope) = &provider.scope {
		oauth.scopes = OAuthClientConfig::parse_scopes(scope);
	}
}

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/auth/providers", get(routes::auth::list_providers))
		.route("/auth/authorize/{provider_id}", get(routes::auth::authorize))
		.route("/auth/callback/{provider_id}", get(routes::auth::callback))
		.route("/auth/link-account", post(routes::auth::link_account))
		.with_state(state)
		.merge(SwaggerUi::new("/api").url("/api/openapi.json", crate::api_docs::ApiDoc::openapi()))
}
