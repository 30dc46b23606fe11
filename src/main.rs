//! YoueJia Gateway - cloud electric heater bridge
//!
//! Polls YoueJia heaters through the vendor's ubus JSON-RPC cloud API and
//! exposes them as climate entities over a small REST API.

mod api;
mod climate;
mod config;
mod error;
mod models;
mod state;
mod youejia;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::climate::setup_heaters;
use crate::state::AppState;
use crate::youejia::{HeaterCoordinator, YoueJiaClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "youejia_gateway=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting YoueJia Gateway...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Configuration loaded ({} devices, base URL {})",
        config.devices.len(),
        config.api.base_url
    );

    let client = Arc::new(YoueJiaClient::from_config(&config.api));
    tracing::info!("[YoueJia] Client ready for user {}", client.user_id());

    let coordinator = Arc::new(HeaterCoordinator::new(
        client.clone(),
        config.serial_numbers(),
        Duration::from_secs(config.polling.interval_secs),
    ));

    // Entities are not created until the first poll succeeds
    coordinator
        .first_refresh()
        .await
        .context("initial refresh of YoueJia devices failed")?;

    let heaters = setup_heaters(&config.devices, &coordinator).await;

    // Background polling
    tokio::spawn(coordinator.clone().start());

    let app_state = AppState::new(coordinator, heaters);

    let cors = CorsLayer::permissive();
    let app = api::routes().with_state(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.host))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.close().await;
    tracing::info!("YoueJia Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
