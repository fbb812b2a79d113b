//! Accept loop and worker pool.

pub mod listener;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::SessionSettings;
use listener::Acceptor;
use scheduler::Scheduler;

/// How long in-flight sessions get to finish once a stop is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Binds, starts the worker pool, and serves until Ctrl+C.
///
/// Bind failures return before any worker thread is started.
pub fn serve(cfg: &ServerConfig) -> anyhow::Result<()> {
    let acceptor = Acceptor::bind(cfg.bind_addr())?;
    let scheduler = Scheduler::new(cfg.workers)?;

    info!(
        address = %acceptor.local_addr(),
        root = %cfg.root.display(),
        workers = scheduler.workers(),
        "Serving directory"
    );

    let settings = Arc::new(SessionSettings::from_config(cfg));
    let stop_signal = scheduler.stop_signal();
    let stop = scheduler.stop_handle();

    let result = scheduler.block_on(async move {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    stop.stop();
                }
                Err(e) => tracing::error!(error = %e, "Unable to listen for shutdown signal"),
            }
        });

        acceptor.run(settings, stop_signal, SHUTDOWN_GRACE).await
    });

    scheduler.shutdown(SHUTDOWN_GRACE);
    result
}
