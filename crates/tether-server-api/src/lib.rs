// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod auth;
pub mod health;

pub use auth::{
	AuthErrorResponse, AuthorizeQuery, CallbackResponse, IdentityResponse, LinkAccountRequest,
	LinkAccountResponse, ProviderInfo, ProvidersResponse,
};
pub use health::{HealthComponent, HealthResponse, HealthStatus};
