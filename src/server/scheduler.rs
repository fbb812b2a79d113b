//! Worker pool sharing one event loop.
//!
//! `workers` counts every thread the server occupies, including the thread
//! that calls [`Scheduler::block_on`]. With one worker the runtime is
//! single-threaded and driven entirely by the caller.
//!
//! With more than one worker the pool is a multi-thread runtime of
//! `workers - 1` threads. The caller's thread then drives only the future
//! passed to `block_on` (the acceptor), while spawned sessions run on the
//! pool threads. Sessions therefore share `workers - 1` threads, not all of
//! them.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tracing::{debug, info};

pub struct Scheduler {
    runtime: Runtime,
    workers: usize,
    stop: StopHandle,
}

/// Creates a connected stop handle and signal outside of any scheduler.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Receiving side of the scheduler's stop signal.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Completes once stop has been requested.
    pub async fn stopped(&mut self) {
        // An error means the scheduler is gone, which is a stop as well.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Cloneable handle that requests a stop from any thread.
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Scheduler {
    pub fn new(workers: usize) -> anyhow::Result<Self> {
        if workers == 0 {
            bail!("scheduler needs at least one worker");
        }

        let runtime = if workers == 1 {
            Builder::new_current_thread().enable_all().build()
        } else {
            Builder::new_multi_thread()
                .worker_threads(workers - 1)
                .thread_name("rootserve-worker")
                .enable_all()
                .build()
        }
        .context("failed to start worker pool")?;

        let (stop, _) = stop_channel();

        debug!(workers, "Scheduler started");

        Ok(Self {
            runtime,
            workers,
            stop,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.signal()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs `future` on the calling thread, which joins the pool until it completes.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Signals stop, then joins every worker thread before the runtime is dropped.
    ///
    /// Tasks still running after `grace` are cancelled.
    pub fn shutdown(self, grace: Duration) {
        self.stop.stop();
        self.runtime.shutdown_timeout(grace);
        info!(workers = self.workers, "Worker pool stopped");
    }
}
