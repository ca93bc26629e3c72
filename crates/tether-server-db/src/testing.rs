// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::migrations::run_migrations;

/// Single-connection in-memory pool; every connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.expect("in-memory pool")
}

/// In-memory pool with the `links` table in place.
pub async fn create_link_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	run_migrations(&pool).await.expect("migrations");
	pool
}
