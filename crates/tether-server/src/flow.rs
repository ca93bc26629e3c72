// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Linking orchestrator.
//!
//! Each request runs as a small state machine. [`LinkingFlow::advance`]
//! performs one step; [`LinkingFlow::run`] loops until a terminal state:
//!
//! ```text
//! AuthorizeRequested -> ProviderRedirected
//! CallbackReceived -> IdentityResolved -> Linked | LinkingRequired
//! LinkRequested -> Linked
//! Linked -> TokenIssuedOrSkipped -> Complete
//! ```
//!
//! Any step may fail with a [`FlowError`]; there is no recovery inside the
//! machine.

use std::sync::Arc;

use serde_json::Value;
use tether_common_secret::SecretString;
use tether_server_account::{validate_credentials, AccountClient};
use tether_server_auth::{
	reserved_response_key, CallbackParams, IdentityProvider, NormalizedIdentity, ProviderError,
	ProviderRegistry,
};
use tether_server_config::{AppConfig, Registry, TenantConfig};
use tether_server_db::{LinkStore, NewLink};

use crate::error::FlowError;
use crate::link_ticket::LinkTicketSigner;

/// Query parameter naming the tenant.
pub const APP_ID_PARAM: &str = "appId";
/// Query parameter carrying the session token on the tenant redirect.
pub const TOKEN_PARAM: &str = "_token";

#[derive(Debug)]
pub enum FlowState {
	AuthorizeRequested {
		provider_id: String,
		query: Vec<(String, String)>,
	},
	ProviderRedirected {
		location: String,
	},
	CallbackReceived {
		provider_id: String,
		query: Vec<(String, String)>,
	},
	IdentityResolved {
		provider_id: String,
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
	},
	LinkingRequired {
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
		link_ticket: String,
	},
	LinkRequested {
		provider_id: String,
		app_id: String,
		payload: Value,
		link_ticket: String,
	},
	Linked {
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
		account_id: String,
	},
	TokenIssuedOrSkipped {
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
		token: Option<SecretString>,
	},
	Complete {
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
		token: Option<SecretString>,
		redirect_url: Option<String>,
	},
}

impl FlowState {
	pub fn name(&self) -> &'static str {
		match self {
			FlowState::AuthorizeRequested { .. } => "authorize_requested",
			FlowState::ProviderRedirected { .. } => "provider_redirected",
			FlowState::CallbackReceived { .. } => "callback_received",
			FlowState::IdentityResolved { .. } => "identity_resolved",
			FlowState::LinkingRequired { .. } => "linking_required",
			FlowState::LinkRequested { .. } => "link_requested",
			FlowState::Linked { .. } => "linked",
			FlowState::TokenIssuedOrSkipped { .. } => "token_issued_or_skipped",
			FlowState::Complete { .. } => "complete",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			FlowState::ProviderRedirected { .. }
				| FlowState::LinkingRequired { .. }
				| FlowState::Complete { .. }
		)
	}
}

/// Collaborators shared by every flow. Cheap to clone.
#[derive(Clone)]
pub struct LinkingFlow {
	registry: Arc<Registry>,
	providers: Arc<ProviderRegistry>,
	links: Arc<dyn LinkStore>,
	accounts: AccountClient,
	tickets: Arc<LinkTicketSigner>,
}

impl LinkingFlow {
	pub fn new(
		registry: Arc<Registry>,
		providers: Arc<ProviderRegistry>,
		links: Arc<dyn LinkStore>,
		accounts: AccountClient,
		tickets: Arc<LinkTicketSigner>,
	) -> Self {
		Self {
			registry,
			providers,
			links,
			accounts,
			tickets,
		}
	}

	/// Drive `state` until it is terminal.
	pub async fn run(&self, mut state: FlowState) -> Result<FlowState, FlowError> {
		while !state.is_terminal() {
			let from = state.name();
			state = match self.advance(state).await {
				Ok(next) => next,
				Err(e) => {
					tracing::debug!(from, error = %e, "flow errored");
					return Err(e);
				}
			};
			tracing::debug!(from, to = state.name(), "flow transition");
		}
		Ok(state)
	}

	/// Perform one step. Terminal states are returned unchanged.
	pub async fn advance(&self, state: FlowState) -> Result<FlowState, FlowError> {
		match state {
			FlowState::AuthorizeRequested { provider_id, query } => {
				self.authorize(&provider_id, query)
			}
			FlowState::CallbackReceived { provider_id, query } => {
				self.callback(provider_id, query).await
			}
			FlowState::IdentityResolved {
				provider_id,
				tenant,
				identity,
			} => self.resolve_identity(&provider_id, tenant, identity).await,
			FlowState::LinkRequested {
				provider_id,
				app_id,
				payload,
				link_ticket,
			} => {
				self.link(&provider_id, &app_id, &payload, &link_ticket)
					.await
			}
			FlowState::Linked {
				tenant,
				identity,
				account_id,
			} => Ok(self.issue_token(tenant, identity, &account_id).await),
			FlowState::TokenIssuedOrSkipped {
				tenant,
				identity,
				token,
			} => Ok(complete(tenant, identity, token)),
			terminal => Ok(terminal),
		}
	}

	fn authorize(
		&self,
		provider_id: &str,
		query: Vec<(String, String)>,
	) -> Result<FlowState, FlowError> {
		if let Some(key) = reserved_response_key(&query) {
			return Err(FlowError::BadRequest(format!(
				"query parameter '{key}' is reserved for the identity provider response"
			)));
		}
		let params = CallbackParams::from_authorize_query(query);
		let app_id = params
			.get(APP_ID_PARAM)
			.filter(|id| !id.trim().is_empty())
			.ok_or_else(|| FlowError::BadRequest("missing appId query parameter".to_string()))?;

		self.registry.provider(provider_id, "authorize")?;
		self.registry.tenant(app_id, "authorize")?;
		let adapter = self.adapter(provider_id)?;

		let location = adapter
			.authorization_url(&params)
			.map_err(FlowError::ProviderExchange)?;
		tracing::info!(provider_id, app_id, "redirecting to identity provider");
		Ok(FlowState::ProviderRedirected { location })
	}

	async fn callback(
		&self,
		provider_id: String,
		query: Vec<(String, String)>,
	) -> Result<FlowState, FlowError> {
		match self.registry.resolve(&provider_id, "callback") {
			Ok(AppConfig::Provider(_)) => {}
			Ok(AppConfig::Tenant(_)) => {
				self.registry.provider(&provider_id, "callback")?;
			}
			Err(_) => return Err(FlowError::UnsupportedProvider(provider_id)),
		}
		let adapter = self.adapter(&provider_id)?;

		let value = |key: &str| {
			query
				.iter()
				.find(|(k, _)| k == key)
				.map(|(_, v)| v.as_str())
				.filter(|v| !v.is_empty())
		};

		if let Some(error) = value("error") {
			let description = value("error_description").unwrap_or("");
			tracing::warn!(provider_id = %provider_id, error, description, "provider returned an error redirect");
			return Err(FlowError::ProviderExchange(ProviderError::Parse {
				stage: "authorize",
				message: format!("provider returned '{error}': {description}"),
			}));
		}

		let code = value("code")
			.ok_or_else(|| FlowError::BadRequest("missing code query parameter".to_string()))?
			.to_string();
		let params = CallbackParams::from_callback_query(query);
		let app_id = params
			.get(APP_ID_PARAM)
			.filter(|id| !id.trim().is_empty())
			.ok_or_else(|| FlowError::BadRequest("missing appId query parameter".to_string()))?;
		let tenant = self.registry.tenant(app_id, "callback")?;

		let identity = adapter
			.exchange_code(&code, &params)
			.await
			.map_err(|e| {
				tracing::warn!(provider_id = %provider_id, error = %e, upstream_status = ?e.upstream_status(), "code exchange failed");
				FlowError::ProviderExchange(e)
			})?;

		Ok(FlowState::IdentityResolved {
			provider_id,
			tenant,
			identity,
		})
	}

	async fn resolve_identity(
		&self,
		provider_id: &str,
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
	) -> Result<FlowState, FlowError> {
		let email = identity.normalized_email();
		if let Some(link) = self.links.find_link(provider_id, &tenant.id, &email).await? {
			tracing::info!(provider_id, tenant_id = %tenant.id, "identity already linked");
			return Ok(FlowState::Linked {
				tenant,
				identity,
				account_id: link.account_id,
			});
		}

		let link_ticket = self
			.tickets
			.issue(provider_id, &tenant.id, &identity)
			.map_err(FlowError::ticket_issue)?;
		tracing::info!(provider_id, tenant_id = %tenant.id, "identity not linked, credentials required");
		Ok(FlowState::LinkingRequired {
			tenant,
			identity,
			link_ticket,
		})
	}

	async fn link(
		&self,
		provider_id: &str,
		app_id: &str,
		payload: &Value,
		link_ticket: &str,
	) -> Result<FlowState, FlowError> {
		self.registry.provider(provider_id, "link-account")?;
		let tenant = self.registry.tenant(app_id, "link-account")?;
		let identity = self.tickets.verify(link_ticket, provider_id, &tenant.id)?;
		let fields = validate_credentials(&tenant.link_fields, payload)?;

		let account_id = self.accounts.resolve_account_id(&tenant, &fields).await?;

		let metadata = serde_json::to_value(&identity)
			.map_err(|e| FlowError::Internal(format!("failed to encode identity: {e}")))?;
		let link = self
			.links
			.create_or_get_link(NewLink {
				provider_id: provider_id.to_string(),
				tenant_id: tenant.id.clone(),
				email: identity.normalized_email(),
				account_id,
				metadata,
			})
			.await?;
		tracing::info!(provider_id, tenant_id = %tenant.id, link_id = %link.id, "identity linked");

		Ok(FlowState::Linked {
			tenant,
			identity,
			account_id: link.account_id,
		})
	}

	async fn issue_token(
		&self,
		tenant: Arc<TenantConfig>,
		identity: NormalizedIdentity,
		account_id: &str,
	) -> FlowState {
		let token = match self.accounts.issue_token(&tenant, account_id).await {
			Ok(token) => Some(token),
			Err(e) => {
				tracing::warn!(tenant_id = %tenant.id, error = %e, "token issuance failed, continuing without token");
				None
			}
		};
		FlowState::TokenIssuedOrSkipped {
			tenant,
			identity,
			token,
		}
	}

	fn adapter(&self, provider_id: &str) -> Result<Arc<dyn IdentityProvider>, FlowError> {
		self.providers
			.get(provider_id)
			.ok_or_else(|| FlowError::UnsupportedProvider(provider_id.to_string()))
	}
}

fn complete(
	tenant: Arc<TenantConfig>,
	identity: NormalizedIdentity,
	token: Option<SecretString>,
) -> FlowState {
	let redirect_url = token
		.as_ref()
		.map(|t| tenant_redirect_url(&tenant.app_url, t.expose()));
	FlowState::Complete {
		tenant,
		identity,
		token,
		redirect_url,
	}
}

/// `<app_url>/?_token=<token>`.
pub fn tenant_redirect_url(app_url: &str, token: &str) -> String {
	let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
	format!("{}/?{TOKEN_PARAM}={encoded}", app_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tether_server_config::load_config_from_str;
	use tether_server_db::{DbError, Link, LinkRepository};

	struct FakeProvider {
		exchanges: AtomicUsize,
	}

	#[async_trait]
	impl IdentityProvider for FakeProvider {
		fn provider_id(&self) -> &str {
			"google"
		}

		fn family(&self) -> &'static str {
			"google"
		}

		fn authorization_url(&self, params: &CallbackParams) -> Result<String, ProviderError> {
			Ok(format!(
				"https://idp.example.com/authorize?redirect_uri={}",
				params.redirect_uri("https://auth.example.com/auth/callback/google")?
			))
		}

		async fn exchange_code(
			&self,
			_code: &str,
			_params: &CallbackParams,
		) -> Result<NormalizedIdentity, ProviderError> {
			self.exchanges.fetch_add(1, Ordering::SeqCst);
			Ok(NormalizedIdentity {
				sub: "g-1".to_string(),
				name: "Ada Lovelace".to_string(),
				given_name: "Ada".to_string(),
				family_name: "Lovelace".to_string(),
				picture: None,
				email: "A@x.com".to_string(),
				email_verified: true,
			})
		}
	}

	/// Link store that counts writes.
	struct CountingStore {
		inner: LinkRepository,
		writes: AtomicUsize,
	}

	#[async_trait]
	impl LinkStore for CountingStore {
		async fn find_link(
			&self,
			provider_id: &str,
			tenant_id: &str,
			email: &str,
		) -> Result<Option<Link>, DbError> {
			self.inner.find_link(provider_id, tenant_id, email).await
		}

		async fn create_or_get_link(&self, link: NewLink) -> Result<Link, DbError> {
			self.writes.fetch_add(1, Ordering::SeqCst);
			self.inner.create_or_get_link(link).await
		}

		async fn list_links(&self, provider_id: &str, tenant_id: &str) -> Result<Vec<Link>, DbError> {
			self.inner.list_links(provider_id, tenant_id).await
		}
	}

	const CONFIG: &str = r#"
[apps.acme]
account_api_url = "http://127.0.0.1:9"
account_api_key = "acme-key"
app_url = "https://acme.example.com/"

[apps.google]
is_provider = true
client_id = "g-client"
client_secret = "g-secret"
redirect_url = "https://auth.example.com/auth/callback/google"

[apps.corp]
is_provider = true
family = "saml"
client_id = "c"
client_secret = "s"
redirect_url = "https://auth.example.com/auth/callback/corp"
"#;

	async fn flow() -> (LinkingFlow, Arc<FakeProvider>, Arc<CountingStore>) {
		let config = load_config_from_str(CONFIG).unwrap();
		let provider = Arc::new(FakeProvider {
			exchanges: AtomicUsize::new(0),
		});
		let mut providers = ProviderRegistry::new();
		providers.register(provider.clone());
		let store = Arc::new(CountingStore {
			inner: LinkRepository::new(tether_server_db::testing::create_link_test_pool().await),
			writes: AtomicUsize::new(0),
		});
		let flow = LinkingFlow::new(
			config.registry.clone(),
			Arc::new(providers),
			store.clone(),
			AccountClient::new(reqwest::Client::new()),
			Arc::new(LinkTicketSigner::generated(Duration::from_secs(60))),
		);
		(flow, provider, store)
	}

	fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
		items
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[tokio::test]
	async fn authorize_requires_app_id() {
		let (flow, _, _) = flow().await;
		let err = flow
			.run(FlowState::AuthorizeRequested {
				provider_id: "google".to_string(),
				query: pairs(&[("lang", "en")]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlowError::BadRequest(_)));
	}

	#[tokio::test]
	async fn authorize_refuses_oauth_response_keys() {
		let (flow, _, _) = flow().await;
		let err = flow
			.run(FlowState::AuthorizeRequested {
				provider_id: "google".to_string(),
				query: pairs(&[("appId", "acme"), ("state", "tenant-csrf")]),
			})
			.await
			.unwrap_err();
		match err {
			FlowError::BadRequest(message) => assert!(message.contains("'state'"), "{message}"),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn authorize_rejects_swapped_roles() {
		let (flow, _, _) = flow().await;
		let err = flow
			.run(FlowState::AuthorizeRequested {
				provider_id: "acme".to_string(),
				query: pairs(&[("appId", "google")]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlowError::RoleMismatch(_)));
	}

	#[tokio::test]
	async fn provider_without_adapter_is_unsupported() {
		let (flow, _, _) = flow().await;
		let err = flow
			.run(FlowState::AuthorizeRequested {
				provider_id: "corp".to_string(),
				query: pairs(&[("appId", "acme")]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlowError::UnsupportedProvider(_)));
	}

	#[tokio::test]
	async fn unknown_callback_provider_never_exchanges() {
		let (flow, provider, _) = flow().await;
		let err = flow
			.run(FlowState::CallbackReceived {
				provider_id: "nope".to_string(),
				query: pairs(&[("code", "c"), ("appId", "acme")]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlowError::UnsupportedProvider(_)));
		assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn callback_error_redirect_is_provider_failure() {
		let (flow, provider, _) = flow().await;
		let err = flow
			.run(FlowState::CallbackReceived {
				provider_id: "google".to_string(),
				query: pairs(&[("error", "access_denied"), ("appId", "acme")]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, FlowError::ProviderExchange(_)));
		assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn unlinked_callback_requires_linking_without_writes() {
		let (flow, _, store) = flow().await;
		let state = flow
			.run(FlowState::CallbackReceived {
				provider_id: "google".to_string(),
				query: pairs(&[("code", "c"), ("appId", "acme"), ("state", "s")]),
			})
			.await
			.unwrap();
		match state {
			FlowState::LinkingRequired {
				tenant, link_ticket, ..
			} => {
				assert_eq!(tenant.link_fields, vec!["email", "password"]);
				assert!(link_ticket.contains('.'));
			}
			other => panic!("unexpected state {}", other.name()),
		}
		assert_eq!(store.writes.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn token_redirect_strips_trailing_slash() {
		assert_eq!(
			tenant_redirect_url("https://acme.example.com/", "a b+c"),
			"https://acme.example.com/?_token=a+b%2Bc"
		);
	}

	#[tokio::test]
	async fn terminal_state_does_not_advance() {
		let (flow, _, _) = flow().await;
		let state = flow
			.advance(FlowState::ProviderRedirected {
				location: "https://idp.example.com".to_string(),
			})
			.await
			.unwrap();
		assert_eq!(state.name(), "provider_redirected");
	}
}
