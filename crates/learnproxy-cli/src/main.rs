//! Binary entry point: loads configuration, hydrates the Dispatch Core
//! from persisted state, and serves the `/admin` and catch-all surfaces
//! until shutdown.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use learnproxy_core::{
    consolidator, AppConfig, Engine, JsonFileStore, LearningBuffer, ReqwestForwarder, Shutdown, Storage,
};
use tracing::{error, info, warn};

/// How often the background flusher persists accumulated state.
const PERSISTENCE_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    learnproxy_core::logging::init("info");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    let storage: Arc<dyn Storage> = Arc::new(JsonFileStore::new(config.db_path.clone()));
    let persisted = match storage.load().await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "fatal storage error at boot");
            return ExitCode::from(2);
        }
    };

    let mode = config.mode;
    let failover = config.failover;
    let target_base = config.target_url.as_ref().map(ToString::to_string);
    let buffer = Arc::new(LearningBuffer::default());
    let engine = Arc::new(Engine::new(mode, failover, target_base, Arc::new(ReqwestForwarder::new()), buffer));
    engine.hydrate(persisted);

    info!(mode = %mode, listen_addr = %config.listen_addr, "learnproxy starting");

    let shutdown = Arc::new(Shutdown::new());
    let consolidator_handle = tokio::spawn(consolidator::run(engine.clone(), shutdown.clone()));
    let flusher_handle =
        tokio::spawn(consolidator::run_persistence_flusher(engine.clone(), storage.clone(), PERSISTENCE_FLUSH_INTERVAL));

    let app = learnproxy_http::build_router(engine.clone());
    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.listen_addr, "failed to bind listen address");
            return ExitCode::from(1);
        }
    };

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to install ctrl-c handler");
            }
        })
        .await;
    if let Err(e) = serve_result {
        error!(error = %e, "server exited with an error");
    }

    shutdown.trigger();
    flusher_handle.abort();
    if tokio::time::timeout(consolidator::SHUTDOWN_GRACE_PERIOD, consolidator_handle).await.is_err() {
        warn!("consolidator did not drain within the shutdown grace period");
    }

    if let Err(e) = consolidator::flush_once(&engine, storage.as_ref()).await {
        error!(error = %e, "final persistence flush failed");
    }

    info!("learnproxy stopped");
    ExitCode::SUCCESS
}
