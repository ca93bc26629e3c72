// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Failures talking to a tenant's system of record.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
	/// No account matches the supplied credentials.
	#[error("account not found")]
	NotFound,

	/// The credentials belong to an account of a different client.
	#[error("account does not belong to this application")]
	Mismatch,

	#[error("invalid credentials payload: {0}")]
	InvalidCredentials(String),

	#[error("system of record returned {status}: {body}")]
	Upstream { status: u16, body: String },

	#[error("system of record request failed: {0}")]
	Transport(#[source] reqwest::Error),

	#[error("malformed system of record response: {0}")]
	MalformedResponse(String),

	/// Token issuance failed; callers degrade to "no token".
	#[error("token issuance failed: {0}")]
	TokenIssuance(String),
}

impl AccountError {
	pub fn is_timeout(&self) -> bool {
		matches!(self, AccountError::Transport(e) if e.is_timeout())
	}
}
