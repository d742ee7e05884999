use std::sync::Arc;

use food_dispatch::api;
use food_dispatch::config::{Config, LogFormat};
use food_dispatch::error::AppError;
use food_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let http_port = config.http_port;
    let shared_state = Arc::new(AppState::with_log_mailer(config));

    tracing::info!(
        scope = ?shared_state.config.exclusivity_scope,
        radius_m = shared_state.config.search_radius_meters,
        "dispatch state initialised"
    );

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    let counts = shared_state.store.counts();
    tracing::info!(
        orders = counts.orders,
        assignments = counts.assignments,
        active_deliveries = counts.active_deliveries,
        "http server stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
