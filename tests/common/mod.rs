#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// A parsed HTTP response as seen by a client.
#[derive(Debug)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ClientResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Reads one response. `with_body` is false for replies to HEAD.
pub async fn read_response<R>(reader: &mut BufReader<R>, with_body: bool) -> ClientResponse
where
    R: AsyncRead + Unpin,
{
    let mut status_line = String::new();
    reader.read_line(&mut status_line).await.unwrap();
    assert!(status_line.starts_with("HTTP/1.1 "), "bad status line: {status_line:?}");
    let status = status_line[9..12].parse().unwrap();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (k, v) = line.split_once(':').unwrap();
        headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
    }

    let len: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);

    let mut body = vec![0u8; if with_body { len } else { 0 }];
    reader.read_exact(&mut body).await.unwrap();

    ClientResponse {
        status,
        headers,
        body,
    }
}

/// Asserts the peer closed: the next read returns end of stream.
pub async fn assert_closed<R>(reader: &mut BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    let mut rest = Vec::new();
    let n = tokio::time::timeout(std::time::Duration::from_secs(5), reader.read_to_end(&mut rest))
        .await
        .expect("connection was not closed")
        .unwrap_or(0);
    assert_eq!(n, 0, "unexpected trailing bytes: {:?}", String::from_utf8_lossy(&rest));
}

/// Served directory with a small fixed tree:
///
/// ```text
/// a/b.txt         "hello world"
/// index.html      "<h1>hi</h1>"
/// blob.bin        100 KiB of patterned bytes
/// ```
pub fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/b.txt"), b"hello world").unwrap();
    std::fs::write(dir.path().join("index.html"), b"<h1>hi</h1>").unwrap();
    std::fs::write(dir.path().join("blob.bin"), blob()).unwrap();
    dir
}

pub fn blob() -> Vec<u8> {
    (0..100 * 1024).map(|i| (i % 251) as u8).collect()
}

pub fn canonical(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap()
}
