// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Upstream bodies are cut to this many bytes before they are kept in errors.
const MAX_BODY_LEN: usize = 2048;

/// Failures while talking to an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	/// Adapter configuration is unusable (bad URL, empty client id, ...).
	#[error("invalid provider configuration: {0}")]
	InvalidConfig(String),

	/// The provider answered with a non-2xx status or an OAuth error body.
	#[error("{stage} request returned {status}: {body}")]
	Upstream {
		stage: &'static str,
		status: u16,
		body: String,
	},

	/// Network failure or timeout.
	#[error("{stage} request failed: {source}")]
	Transport {
		stage: &'static str,
		#[source]
		source: reqwest::Error,
	},

	/// The provider answered 2xx with a body we cannot use.
	#[error("failed to parse {stage} response: {message}")]
	Parse {
		stage: &'static str,
		message: String,
	},

	#[error("ID token rejected: {0}")]
	InvalidIdToken(String),
}

impl ProviderError {
	pub fn upstream(stage: &'static str, status: u16, body: &str) -> Self {
		ProviderError::Upstream {
			stage,
			status,
			body: truncate_body(body),
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, ProviderError::Transport { source, .. } if source.is_timeout())
	}

	/// HTTP status the provider returned, when there was one.
	pub fn upstream_status(&self) -> Option<u16> {
		match self {
			ProviderError::Upstream { status, .. } => Some(*status),
			_ => None,
		}
	}
}

fn truncate_body(body: &str) -> String {
	if body.len() <= MAX_BODY_LEN {
		return body.to_string();
	}
	let mut end = MAX_BODY_LEN;
	while !body.is_char_boundary(end) {
		end -= 1;
	}
	format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn long_bodies_are_truncated_on_char_boundary() {
		let body = "é".repeat(MAX_BODY_LEN);
		let ProviderError::Upstream { body: kept, .. } = ProviderError::upstream("token", 500, &body)
		else {
			panic!("expected upstream");
		};
		assert!(kept.len() <= MAX_BODY_LEN + 3);
		assert!(kept.ends_with("..."));
	}

	#[test]
	fn upstream_status_is_exposed() {
		let err = ProviderError::upstream("userinfo", 401, "bad token");
		assert_eq!(err.upstream_status(), Some(401));
		assert_eq!(err.to_string(), "userinfo request returned 401: bad token");
		assert!(!err.is_timeout());
	}
}
