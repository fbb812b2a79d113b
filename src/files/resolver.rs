//! Request target to filesystem path resolution.
//!
//! Resolution never yields a path outside the served root. Every way a target
//! can fail (bad encoding, NUL bytes, `..` above the root, symlinks leading
//! out) collapses into [`ResolvedTarget::NotFound`], so a client cannot tell
//! an out-of-root path from a missing one.

use std::io;
use std::path::{Path, PathBuf};

use url::Url;

use crate::http::mime::content_type_for;

/// Outcome of resolving a request target against the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// A readable regular file under the root.
    File {
        path: PathBuf,
        size: u64,
        content_type: String,
    },
    /// The target names a directory; there is no index page.
    Directory,
    NotFound,
}

/// What the resolver needs to know about a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File { len: u64 },
    Directory,
    Other,
}

/// Filesystem queries used by [`resolve`].
pub trait Lookup {
    /// Absolute path with every symlink and `.`/`..` resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Kind of the entry at `path`, following symlinks.
    fn entry(&self, path: &Path) -> io::Result<EntryKind>;
}

/// [`Lookup`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLookup;

impl Lookup for DiskLookup {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn entry(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = std::fs::metadata(path)?;
        Ok(if meta.is_file() {
            EntryKind::File { len: meta.len() }
        } else if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        })
    }
}

/// Resolves `target` against `root`, which must already be canonical.
pub fn resolve<L: Lookup + ?Sized>(target: &str, root: &Path, lookup: &L) -> ResolvedTarget {
    let Some(segments) = target_segments(target) else {
        return ResolvedTarget::NotFound;
    };

    let mut candidate = root.to_path_buf();
    candidate.extend(&segments);

    let Ok(canonical) = lookup.canonicalize(&candidate) else {
        return ResolvedTarget::NotFound;
    };

    // Component-wise, so "/srv/www-evil" is not inside "/srv/www".
    if !canonical.starts_with(root) {
        tracing::warn!(request_target = %target, "Request target resolved outside the root");
        return ResolvedTarget::NotFound;
    }

    match lookup.entry(&canonical) {
        Ok(EntryKind::File { len }) => {
            let content_type = content_type_for(&canonical);
            ResolvedTarget::File {
                path: canonical,
                size: len,
                content_type,
            }
        }
        Ok(EntryKind::Directory) => ResolvedTarget::Directory,
        Ok(EntryKind::Other) | Err(_) => ResolvedTarget::NotFound,
    }
}

/// Decoded, normalized path segments of a request target.
///
/// `None` if the target is not origin-form or absolute-form, does not decode
/// to UTF-8, contains a NUL or backslash, or climbs above the root.
pub fn target_segments(target: &str) -> Option<Vec<String>> {
    let raw_path = raw_path(target)?;

    let mut segments: Vec<String> = Vec::new();
    for raw in raw_path.split('/') {
        let decoded = urlencoding::decode_binary(raw.as_bytes());
        let decoded = String::from_utf8(decoded.into_owned()).ok()?;

        if decoded.contains('\0') || decoded.contains('\\') {
            return None;
        }

        // A decoded "%2F" splits into further segments.
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other.to_string()),
            }
        }
    }

    Some(segments)
}

/// Still percent-encoded path of the target, without query or fragment.
fn raw_path(target: &str) -> Option<String> {
    if target.starts_with('/') {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        return Some(target[..end].to_string());
    }

    let url = Url::parse(target).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.path().to_string()),
        _ => None,
    }
}
