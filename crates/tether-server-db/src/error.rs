// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Link store failures.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	/// A row the store just wrote could not be read back.
	#[error("Not found: {0}")]
	NotFound(String),

	/// The link to be written violates a store invariant.
	#[error("Invalid link: {0}")]
	InvalidLink(String),

	/// Stored data or configuration the store cannot interpret.
	#[error("Internal: {0}")]
	Internal(String),

	#[error("Metadata serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
