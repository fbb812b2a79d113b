use anyhow::bail;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Chunk size for streaming file bodies.
const BUFFER_SIZE: usize = 8192;

fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Serializes a complete response, in-memory body included.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = serialize_head(resp);
    buf.extend_from_slice(&resp.body);
    buf
}

/// Writes a serialized response, resuming partial writes until it is flushed.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    /// Writer for a response whose body lives in memory.
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    /// Writer for the status line and headers only.
    pub fn head_only(response: &Response) -> Self {
        Self {
            buffer: serialize_head(response),
            written: 0,
        }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                bail!("connection closed while writing");
            }

            self.written += n;
        }

        Ok(())
    }
}

/// Copies exactly `len` bytes from `body` to `stream`.
///
/// A body that ends early is an error: the Content-Length already sent cannot
/// be honored, so the connection must be dropped.
pub async fn stream_body<R, W>(body: &mut R, len: u64, stream: &mut W) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; BUFFER_SIZE];
    let mut remaining = len;

    while remaining > 0 {
        let to_read = remaining.min(BUFFER_SIZE as u64) as usize;
        let n = body.read(&mut chunk[..to_read]).await?;
        if n == 0 {
            bail!("file ended {remaining} bytes before its announced length");
        }

        stream.write_all(&chunk[..n]).await?;
        remaining -= n as u64;
    }

    Ok(len)
}
