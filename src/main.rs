use clap::Parser;

use media_range::config::ServerConfig;
use media_range::server::{MediaState, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    media_range::logging::init_logging();

    let config = ServerConfig::parse();
    config.validate_root()?;
    let policy = config.streaming_policy()?;

    let state = MediaState::new(config.root.clone(), policy)
        .with_cache_control(config.cache_control());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        root = %config.root.display(),
        chunk_cap_bytes = policy.chunk_cap_bytes,
        threshold_bytes = policy.threshold_bytes,
        "serving media",
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
