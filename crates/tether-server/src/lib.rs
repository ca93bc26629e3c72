// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tether identity-linking server.
//!
//! Drives the OAuth authorization-code flow against configured identity
//! providers, links provider identities to tenant accounts and hands back
//! session tokens issued by each tenant's system of record.

pub mod api;
pub mod api_docs;
pub mod error;
pub mod flow;
pub mod health;
pub mod link_ticket;
pub mod routes;

pub use api::{build_provider_registry, create_app_state, create_router, AppState};
pub use api_docs::ApiDoc;
pub use error::{FlowError, ServerError};
pub use flow::{FlowState, LinkingFlow};
pub use link_ticket::{LinkTicketError, LinkTicketSigner};
pub use tether_server_config::ServerConfig;
