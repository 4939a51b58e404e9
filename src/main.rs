// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;

use relational_session_auth::{
    api::router,
    auth::Authenticator,
    config::{ServiceConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = ServiceConfig::from_env()?;
    if config.build.secret_key.is_empty() && config.build.jwt_key.is_empty() {
        warn!("Neither CLERK_SECRET_KEY nor CLERK_JWT_KEY is set; every request will fail");
    }

    info!(
        api_url = %config.build.api_url,
        is_satellite = config.build.is_satellite,
        static_key = !config.build.jwt_key.is_empty(),
        "Authenticator configured"
    );

    let addr = config.bind_address();
    let state = AppState::new(Authenticator::new(config.build), config.runtime);
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Session auth server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
