use anyhow::Result;
use facematch_core::OnnxVerifier;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod server;
#[cfg(test)]
mod testing;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facematchd starting");

    let config = Config::from_env();
    tracing::info!(
        model_dir = %config.verifier.model_dir.display(),
        model = %config.verifier.model,
        detector = %config.verifier.detector,
        metric = %config.verifier.metric,
        threshold = config.threshold,
        image_passing = %config.image_passing,
        "configuration loaded"
    );

    // Load models synchronously so a missing file stops startup
    let verifier = OnnxVerifier::load(config.verifier.clone())?;
    let engine = engine::spawn_engine(verifier, config.queue_depth)?;

    let state = server::AppState::new(engine, &config);
    let app = server::create_app(state);

    let listener = TcpListener::bind(&config.addr).await?;
    tracing::info!(addr = %config.addr, "facematchd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facematchd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
