// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tether identity-linking server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tether_server::{create_app_state, create_router};
use tether_server_config::{LogFormat, LoggingConfig, ServerConfig};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Tether server - multi-tenant OAuth identity-linking broker.
#[derive(Parser, Debug)]
#[command(
	name = "tether-server",
	about = "Tether identity-linking broker",
	version
)]
struct Args {
	/// Server TOML configuration file
	#[arg(long, env = "TETHER_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Load and validate configuration, print a summary and exit
	CheckConfig,
}

fn init_tracing(logging: &LoggingConfig) {
	let json = logging.format == LogFormat::Json;
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| logging.level.clone().into()),
		)
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.with((!json).then(|| tracing_subscriber::fmt::layer()))
		.init();
}

fn print_summary(config: &ServerConfig) {
	println!("listen:    {}:{}", config.http.host, config.http.port);
	println!("database:  {}", config.database.url);
	println!(
		"linking:   ticket ttl {}s, secret {}",
		config.linking.ticket_ttl_secs,
		if config.linking.ticket_secret.is_some() {
			"configured"
		} else {
			"generated per process"
		}
	);
	for tenant in config.registry.tenants() {
		println!(
			"tenant:    {} ({}) fields={}",
			tenant.id,
			tenant.account_api_url,
			tenant.link_fields.join(",")
		);
	}
	for provider in config.registry.providers() {
		println!("provider:  {} family={}", provider.id, provider.family);
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => tether_server_config::load_config_with_file(path)?,
		None => tether_server_config::load_config()?,
	};

	if let Some(Command::CheckConfig) = args.command {
		print_summary(&config);
		return Ok(());
	}

	init_tracing(&config.logging);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		tenants = config.registry.tenants().count(),
		providers = config.registry.providers().count(),
		"starting tether-server"
	);

	let pool = tether_server_db::create_pool(&config.database.url).await?;
	tether_server_db::run_migrations(&pool).await?;

	let state = create_app_state(pool, &config)?;

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr()?;
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
