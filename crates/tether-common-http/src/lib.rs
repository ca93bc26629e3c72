// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Outbound HTTP clients for provider and system-of-record calls.
//!
//! Every client carries the `tether/{version}` User-Agent. Calls to identity
//! providers and to tenant account systems must be bounded, so the
//! constructors here always take a total request timeout.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Upper bound on TCP/TLS connection setup, independent of the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client builder preconfigured with the standard User-Agent.
///
/// ```ignore
/// let client = tether_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Build a client whose requests fail with a timeout error after `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	tracing::debug!(timeout_ms = timeout.as_millis() as u64, "building HTTP client");
	builder()
		.timeout(timeout)
		.connect_timeout(CONNECT_TIMEOUT.min(timeout))
		.build()
}

/// `tether/{crate version}`
pub fn user_agent() -> String {
	format!("tether/{}", env!("CARGO_PKG_VERSION"))
}
