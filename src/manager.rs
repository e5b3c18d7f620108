//! Manager bootstrap: config, tracing, component wiring, and shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flotilla_api::{router, ApiState};
use flotilla_config::{load_config, validate_config};
use flotilla_coordinator::{Coordinator, HttpClient, SecretsState};
use flotilla_engine::ProcessEngine;
use flotilla_store::Store;
use flotilla_writer::Writer;

#[derive(Parser, Debug)]
pub struct ManagerArgs {
    /// Config file path (json/yaml/toml)
    #[arg(short, long, default_value = "manager.toml")]
    pub config: PathBuf,
}

pub async fn run(args: ManagerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    validate_config(&config)?;

    let level = config.logging.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = flotilla_core::VERSION, "flotilla manager starting");

    let store = Arc::new(Store::new(
        config.manager.database_path.clone(),
        config.manager.backup_dir.clone(),
    ));
    store.init()?;

    // Shared secrets fail closed: no entropy, no process.
    let state = Arc::new(SecretsState::new()?);

    let engine = Arc::new(ProcessEngine::new(
        config.engine.binary.clone(),
        config.engine.run_dir.clone(),
    ));
    let writer = Arc::new(Writer::new(config.engine.log_level.clone()));
    let client = HttpClient::new(std::time::Duration::from_secs(config.http.timeout_secs))?;

    let shutdown = CancellationToken::new();
    let coordinator = Coordinator::new(
        store.clone(),
        engine,
        writer.clone(),
        client,
        state,
        shutdown.clone(),
    );

    // Startup sync; a local-config failure here is fatal.
    coordinator.clone().run().await?;

    let app = router(ApiState {
        store: store.clone(),
        writer,
        coordinator,
    });
    let listener = tokio::net::TcpListener::bind(&config.manager.listen).await?;
    info!(listen = %config.manager.listen, "control-plane server listening");

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        signal_shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    store.close();
    info!("flotilla manager stopped");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
