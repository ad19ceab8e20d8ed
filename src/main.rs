use std::sync::Arc;

use route_bid_engine::{api, config, engine, error, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_format.eq_ignore_ascii_case("json") {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    let shared_state = Arc::new(state::AppState::new(
        config.engine.clone(),
        config.event_buffer_size,
    ));

    let app = api::rest::router(shared_state.clone());

    let scheduler = tokio::spawn(engine::scheduler::run_scheduler(
        shared_state.clone(),
        config.sweep_interval,
    ));
    tokio::spawn(async move {
        if let Err(err) = scheduler.await {
            tracing::error!(error = %err, "scheduler task stopped");
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        max_jobs_per_window = config.engine.max_jobs_per_window,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
