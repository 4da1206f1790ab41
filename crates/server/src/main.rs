mod api;
mod error;
mod router;
mod startup;
mod state;

#[cfg(test)]
mod tests;

use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    triage_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = triage_core::Config::from_env();
    config.log_summary();

    let store = startup::connect_store(&config).await;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = startup::build_app_state(config, store);
    let pool = startup::spawn_background(&state).await;

    let app = router::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight jobs finish; no new jobs are dispatched.
    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
