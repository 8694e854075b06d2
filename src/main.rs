use anyhow::Context;
use fwi_predictor::{config::Config, load_first, router, AppState};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(mode = ?cfg.mode, debug = cfg.mode.debug(), testing = cfg.mode.testing(), "starting");
    if cfg.mode == fwi_predictor::config::Mode::Production && cfg.uses_default_secret() {
        tracing::warn!("SECRET_KEY not set; using the development default in production");
    }

    // Single pass over the candidate locations; no reload for the process lifetime.
    let artifacts = load_first(&cfg.candidates());
    if artifacts.is_none() {
        tracing::warn!("serving in degraded mode: /predict will answer 500 until restarted with models");
    }

    let addr = SocketAddr::new(cfg.host, cfg.port);
    let app = router(AppState::new(cfg, artifacts));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
