//! Content type inference from file extensions.

use std::path::Path;

/// Fallback for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Returns the content type for `path` based on its extension.
///
/// Text types get an explicit UTF-8 charset so browsers do not guess.
pub fn content_type_for(path: &Path) -> String {
    let Some(mime) = mime_guess::from_path(path).first() else {
        return DEFAULT_CONTENT_TYPE.to_string();
    };

    if mime.type_() == mime_guess::mime::TEXT
        || mime.subtype() == mime_guess::mime::JAVASCRIPT
        || mime.subtype() == mime_guess::mime::JSON
    {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}
