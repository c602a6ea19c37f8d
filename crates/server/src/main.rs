use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgenie_core::{load_config, spawn_reaper, validate_config, FfmpegEngine, TranscodeEngine};
use vidgenie_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("VIDGENIE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("vidgenie.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Upload directory: {:?}", config.storage.upload_dir);
    info!("Output directory: {:?}", config.storage.output_dir);

    for dir in [
        &config.storage.upload_dir,
        &config.storage.working_dir,
        &config.storage.output_dir,
    ] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    // Create engine
    let engine: Arc<dyn TranscodeEngine> = Arc::new(FfmpegEngine::new(config.engine.clone()));
    match engine.validate().await {
        Ok(()) => info!("Using engine: {}", engine.name()),
        Err(e) => warn!(
            "Engine {} is not available, conversions will fail: {}",
            engine.name(),
            e
        ),
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), engine));

    // Start the stale job reaper
    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        Arc::clone(state.registry()),
        config.jobs.reap_interval(),
        config.jobs.unobserved_ttl(),
        config.engine.max_job_duration() + config.jobs.unobserved_ttl(),
        shutdown.clone(),
    );

    // Open progress streams end as soon as shutdown begins
    let publisher = state.publisher().clone();

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            publisher.close_all();
        })
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    shutdown.cancel();
    let _ = reaper.await;
    info!("Job reaper stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
