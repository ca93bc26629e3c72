// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for tenant systems of record.
//!
//! Each tenant exposes two routes on its `account_api_url`, called with the
//! tenant API key as a bearer token:
//!
//! - resolve (`POST`, default `/accounts/resolve`): credential fields in,
//!   `{"identifier": "..."}` out;
//! - token (`GET`, default `/accounts/{accountId}/token`): `{"token": "..."}`.

mod client;
mod credentials;
mod error;

pub use client::AccountClient;
pub use credentials::{validate_credentials, CredentialFields};
pub use error::AccountError;
