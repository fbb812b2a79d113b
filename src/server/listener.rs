use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::http::connection::{Connection, SessionSettings};
use crate::server::scheduler::StopSignal;

/// Pause after a transient accept failure, so fd exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Owns the listening socket and hands every accepted connection to a session.
pub struct Acceptor {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl Acceptor {
    /// Binds the listening socket.
    ///
    /// This is synchronous so a bind failure surfaces before any worker
    /// thread exists.
    pub fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = std::net::TcpListener::bind(addr)
            .with_context(|| format!("failed to bind {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("failed to make listener non-blocking")?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `stop` fires, then drains sessions for up to `grace`.
    ///
    /// Must be called inside the scheduler. Returns `Err` only for systemic
    /// listener failures.
    pub async fn run(
        self,
        settings: Arc<SessionSettings>,
        mut stop: StopSignal,
        grace: Duration,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::from_std(self.listener)?;

        let mut sessions = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = stop.stopped() => {
                    info!("Stop requested, no longer accepting connections");
                    break Ok(());
                }

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Session task failed");
                    }
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            debug!(%peer, "Accepted connection");
                            let _ = socket.set_nodelay(true);

                            let settings = Arc::clone(&settings);
                            sessions.spawn(
                                async move {
                                    let mut conn = Connection::new(socket, settings);
                                    if let Err(e) = conn.run().await {
                                        warn!(error = %e, "Connection closed with error");
                                    }
                                }
                                .instrument(info_span!("session", %peer)),
                            );
                        }
                        Err(e) if is_fatal(&e) => {
                            error!(error = %e, "Listener failed");
                            break Err(anyhow::Error::new(e).context("accept failed"));
                        }
                        Err(e) => {
                            warn!(error = %e, "Error accepting connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        };

        drop(listener);
        drain(&mut sessions, grace).await;

        result
    }
}

/// Accept errors that mean the listening socket itself is unusable.
fn is_fatal(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Unsupported
    )
}

async fn drain(sessions: &mut JoinSet<()>, grace: Duration) {
    if sessions.is_empty() {
        return;
    }

    info!(active = sessions.len(), "Waiting for active connections to complete");

    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Session task failed during shutdown");
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!(active = sessions.len(), "Grace period over, aborting remaining connections");
        sessions.abort_all();
    }
}
