// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;

/// Durable (provider, tenant, external email) -> account id association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
	pub id: Uuid,
	pub provider_id: String,
	pub tenant_id: String,
	/// Trimmed and lowercased.
	pub email: String,
	/// Opaque identifier in the tenant's system of record.
	pub account_id: String,
	pub metadata: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLink {
	pub provider_id: String,
	pub tenant_id: String,
	pub email: String,
	pub account_id: String,
	pub metadata: serde_json::Value,
}

#[async_trait]
pub trait LinkStore: Send + Sync {
	async fn find_link(
		&self,
		provider_id: &str,
		tenant_id: &str,
		email: &str,
	) -> Result<Option<Link>, DbError>;
	async fn create_or_get_link(&self, link: NewLink) -> Result<Link, DbError>;
	async fn list_links(&self, provider_id: &str, tenant_id: &str) -> Result<Vec<Link>, DbError>;
}

#[async_trait]
impl LinkStore for LinkRepository {
	async fn find_link(
		&self,
		provider_id: &str,
		tenant_id: &str,
		email: &str,
	) -> Result<Option<Link>, DbError> {
		self.find_link(provider_id, tenant_id, email).await
	}

	async fn create_or_get_link(&self, link: NewLink) -> Result<Link, DbError> {
		self.create_or_get_link(link).await
	}

	async fn list_links(&self, provider_id: &str, tenant_id: &str) -> Result<Vec<Link>, DbError> {
		self.list_links(provider_id, tenant_id).await
	}
}

/// Repository for link database operations.
#[derive(Clone)]
pub struct LinkRepository {
	pool: SqlitePool,
}

impl LinkRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Look up a link by its full key. `email` is normalized first.
	#[tracing::instrument(skip(self, email), fields(provider_id = %provider_id, tenant_id = %tenant_id))]
	pub async fn find_link(
		&self,
		provider_id: &str,
		tenant_id: &str,
		email: &str,
	) -> Result<Option<Link>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, provider_id, tenant_id, email, account_id, metadata, created_at, updated_at
			FROM links
			WHERE provider_id = ? AND tenant_id = ? AND email = ?
			"#,
		)
		.bind(provider_id)
		.bind(tenant_id)
		.bind(normalize_email(email))
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_link(&r)).transpose()
	}

	/// Insert a link, or return the existing one for the same key.
	///
	/// On a duplicate key only `metadata` and `updated_at` are refreshed; the
	/// stored account id is never replaced. Concurrent callers for one key
	/// all get the row that won the insert.
	#[tracing::instrument(skip(self, link), fields(provider_id = %link.provider_id, tenant_id = %link.tenant_id))]
	pub async fn create_or_get_link(&self, link: NewLink) -> Result<Link, DbError> {
		let email = normalize_email(&link.email);
		if email.is_empty() {
			return Err(DbError::InvalidLink("email cannot be empty".to_string()));
		}
		let now = Utc::now().to_rfc3339();
		let metadata = serde_json::to_string(&link.metadata)?;

		let inserted = sqlx::query(
			r#"
			INSERT INTO links (id, provider_id, tenant_id, email, account_id, metadata, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(Uuid::new_v4().to_string())
		.bind(&link.provider_id)
		.bind(&link.tenant_id)
		.bind(&email)
		.bind(&link.account_id)
		.bind(&metadata)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await;

		match inserted {
			Ok(_) => tracing::debug!("link created"),
			Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
				tracing::debug!("link already exists, refreshing metadata");
				sqlx::query(
					r#"
					UPDATE links SET metadata = ?, updated_at = ?
					WHERE provider_id = ? AND tenant_id = ? AND email = ?
					"#,
				)
				.bind(&metadata)
				.bind(&now)
				.bind(&link.provider_id)
				.bind(&link.tenant_id)
				.bind(&email)
				.execute(&self.pool)
				.await?;
			}
			Err(e) => return Err(e.into()),
		}

		self
			.find_link(&link.provider_id, &link.tenant_id, &email)
			.await?
			.ok_or_else(|| DbError::NotFound("link missing after insert".to_string()))
	}

	/// All links for a (provider, tenant) pair, oldest first.
	#[tracing::instrument(skip(self), fields(provider_id = %provider_id, tenant_id = %tenant_id))]
	pub async fn list_links(
		&self,
		provider_id: &str,
		tenant_id: &str,
	) -> Result<Vec<Link>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, provider_id, tenant_id, email, account_id, metadata, created_at, updated_at
			FROM links
			WHERE provider_id = ? AND tenant_id = ?
			ORDER BY created_at ASC, email ASC
			"#,
		)
		.bind(provider_id)
		.bind(tenant_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_link).collect()
	}
}

fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{value}': {e}")))
}

fn row_to_link(row: &SqliteRow) -> Result<Link, DbError> {
	let id: String = row.get("id");
	let metadata: String = row.get("metadata");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Link {
		id: Uuid::parse_str(&id).map_err(|e| DbError::Internal(format!("invalid link id: {e}")))?,
		provider_id: row.get("provider_id"),
		tenant_id: row.get("tenant_id"),
		email: row.get("email"),
		account_id: row.get("account_id"),
		metadata: serde_json::from_str(&metadata)?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}
