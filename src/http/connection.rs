use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::files::{DiskLookup, ResolvedTarget, resolve};
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::{ResponseWriter, stream_body};

const READ_CHUNK: usize = 4096;

/// Per-session limits, shared by every connection.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Canonical served directory.
    pub root: Arc<PathBuf>,
    /// How long a session may wait for request bytes.
    pub idle_timeout: Duration,
    /// Largest request head accepted before answering 400.
    pub max_header_bytes: usize,
}

impl SessionSettings {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            root: Arc::new(cfg.root.clone()),
            idle_timeout: cfg.idle_timeout,
            max_header_bytes: cfg.max_header_bytes,
        }
    }
}

/// One client connection, driven through request/response cycles until it closes.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
    settings: Arc<SessionSettings>,
    /// When the request currently being read must be complete.
    deadline: Option<Instant>,
}

pub enum ConnectionState {
    AwaitingRequest,
    ParsingHeaders,
    ResolvingTarget(Request),
    StreamingResponse(PendingResponse),
    Closing,
    Closed,
}

/// A response queued for writing, with the file that supplies its body.
pub struct PendingResponse {
    response: Response,
    file: Option<File>,
    send_body: bool,
    keep_alive: bool,
}

impl PendingResponse {
    /// An error response; the connection closes after it.
    fn rejection(response: Response) -> Self {
        Self {
            response,
            file: None,
            send_body: true,
            keep_alive: false,
        }
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, settings: Arc<SessionSettings>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::AwaitingRequest,
            settings,
            deadline: None,
        }
    }

    /// Runs the session to completion.
    ///
    /// Returns `Err` on an I/O error; the connection is dropped either way.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::AwaitingRequest => self.await_request().await?,
                ConnectionState::ParsingHeaders => self.parse_headers().await?,
                ConnectionState::ResolvingTarget(request) => self.resolve_target(request).await,
                ConnectionState::StreamingResponse(pending) => {
                    self.stream_response(pending).await?
                }
                ConnectionState::Closing => {
                    // Peer may already be gone.
                    let _ = self.stream.shutdown().await;
                    ConnectionState::Closed
                }
                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn await_request(&mut self) -> anyhow::Result<ConnectionState> {
        // One deadline covers the whole head, however it is split across reads.
        self.deadline = Some(Instant::now() + self.settings.idle_timeout);

        // Pipelined bytes from the previous cycle
        if !self.buffer.is_empty() {
            return Ok(ConnectionState::ParsingHeaders);
        }

        match self.fill_buffer().await? {
            0 => Ok(ConnectionState::Closing),
            _ => Ok(ConnectionState::ParsingHeaders),
        }
    }

    async fn parse_headers(&mut self) -> anyhow::Result<ConnectionState> {
        let max = self.settings.max_header_bytes;

        match parse_http_request(&self.buffer) {
            Ok((request, consumed)) => {
                self.buffer.advance(consumed);
                self.deadline = None;

                if consumed - request.body.len() > max {
                    warn!(size = consumed, "Request head too large");
                    return Ok(reject(Response::bad_request()));
                }

                Ok(ConnectionState::ResolvingTarget(request))
            }

            Err(ParseError::Incomplete) => {
                if self.buffer.len() > max {
                    warn!(size = self.buffer.len(), "Request head too large");
                    return Ok(reject(Response::bad_request()));
                }

                match self.fill_buffer().await? {
                    0 => Ok(ConnectionState::Closing),
                    _ => Ok(ConnectionState::ParsingHeaders),
                }
            }

            Err(e) => {
                debug!(error = ?e, "Malformed request");
                Ok(reject(Response::bad_request()))
            }
        }
    }

    async fn resolve_target(&mut self, request: Request) -> ConnectionState {
        if !request.method.is_servable() {
            info!(method = %request.method, path = %request.path, status = 405, "Request");
            return reject(Response::method_not_allowed());
        }

        let root = Arc::clone(&self.settings.root);
        let target = request.path.clone();
        let resolved =
            tokio::task::spawn_blocking(move || resolve(&target, &root, &DiskLookup)).await;

        let (response, file) = match resolved {
            Ok(ResolvedTarget::File {
                path,
                size,
                content_type,
            }) => match File::open(&path).await {
                Ok(file) => (Response::file(size, &content_type), Some(file)),
                Err(e) => {
                    debug!(error = %e, "Resolved file could not be opened");
                    (Response::not_found(), None)
                }
            },
            Ok(ResolvedTarget::Directory) | Ok(ResolvedTarget::NotFound) => {
                (Response::not_found(), None)
            }
            Err(e) => {
                tracing::error!(error = %e, "Resolver task failed");
                (Response::internal_error(), None)
            }
        };

        info!(
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            "Request"
        );

        ConnectionState::StreamingResponse(PendingResponse {
            response,
            file,
            send_body: request.method == Method::GET,
            keep_alive: request.keep_alive(),
        })
    }

    async fn stream_response(
        &mut self,
        pending: PendingResponse,
    ) -> anyhow::Result<ConnectionState> {
        let PendingResponse {
            mut response,
            file,
            send_body,
            keep_alive,
        } = pending;

        let keep_alive = keep_alive && !response.status.forces_close();
        response.set_keep_alive(keep_alive);

        let sent = match (file, send_body) {
            (Some(mut file), true) => {
                ResponseWriter::head_only(&response)
                    .write_to_stream(&mut self.stream)
                    .await?;
                stream_body(&mut file, response.content_length(), &mut self.stream).await?
            }
            (None, true) => {
                ResponseWriter::new(&response)
                    .write_to_stream(&mut self.stream)
                    .await?;
                response.body.len() as u64
            }
            (_, false) => {
                ResponseWriter::head_only(&response)
                    .write_to_stream(&mut self.stream)
                    .await?;
                0
            }
        };
        self.stream.flush().await?;

        debug!(status = response.status.as_u16(), bytes = sent, keep_alive, "Response sent");

        if keep_alive {
            Ok(ConnectionState::AwaitingRequest)
        } else {
            Ok(ConnectionState::Closing)
        }
    }

    /// Reads more bytes into the buffer.
    ///
    /// Returns 0 when the peer closed or the request deadline passed.
    async fn fill_buffer(&mut self) -> anyhow::Result<usize> {
        self.buffer.reserve(READ_CHUNK);

        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + self.settings.idle_timeout);

        match timeout_at(deadline, self.stream.read_buf(&mut self.buffer)).await {
            Ok(read) => Ok(read?),
            Err(_) => {
                debug!(timeout = ?self.settings.idle_timeout, "Idle timeout, closing connection");
                Ok(0)
            }
        }
    }
}

fn reject(response: Response) -> ConnectionState {
    ConnectionState::StreamingResponse(PendingResponse::rejection(response))
}
