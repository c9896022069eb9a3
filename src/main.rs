// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User Auth API Server
//!
//! Serves registration, login, session refresh, user administration and
//! notification endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_auth_api::{
    config::{Config, LogConfig},
    db, error,
    services::Notifier,
    AppState,
};

/// How often expired rate limit windows are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment
    let config = Config::from_env()?;

    init_logging(&config.log)?;
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        "Starting User Auth API"
    );

    error::expose_internal_errors(config.is_development());

    if config.is_production() && config.database_url.starts_with("memory://") {
        tracing::warn!("In-memory store configured in production");
    }

    // Open the store
    let store = db::connect(&config.database_url).await?;
    tracing::info!("Store connected");

    // Notification providers (either may be absent)
    let notifier = Notifier::from_config(&config).await?;
    tracing::info!(
        email = notifier.email_enabled(),
        push = notifier.push_enabled(),
        "Notification providers initialized"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, notifier));

    if config.seed_demo_users {
        state.users.seed_demo_users().await?;
        tracing::info!("Demo users seeded");
    }

    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });

    // Build router
    let app = user_auth_api::routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize structured logging: JSON by default, human-readable when
/// `LOG_PRETTY` is set.
fn init_logging(log: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&log.level)?
        .add_directive("user_auth_api=debug".parse()?);

    let registry = tracing_subscriber::registry().with(filter);

    if log.pretty {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true);
        registry.with(format).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
