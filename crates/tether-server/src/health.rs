// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Health checks.

use sqlx::SqlitePool;
use tether_server_api::{HealthComponent, HealthStatus};
use tokio::time::Instant;

pub async fn check_database(pool: &SqlitePool) -> HealthComponent {
	let start = Instant::now();
	let result = tether_server_db::ping(pool).await;
	let latency_ms = start.elapsed().as_millis() as u64;

	match result {
		Ok(()) => HealthComponent {
			status: HealthStatus::Healthy,
			latency_ms,
			error: None,
		},
		Err(e) => {
			tracing::error!(error = %e, "database health check failed");
			HealthComponent {
				status: HealthStatus::Unhealthy,
				latency_ms,
				error: Some("database unreachable".to_string()),
			}
		}
	}
}
