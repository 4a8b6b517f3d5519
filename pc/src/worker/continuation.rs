//! Continuation tokens
//!
//! A worker CLI returns an opaque session/thread id that lets the next
//! invocation resume its own context. The id is kept in a small side-channel
//! file next to the worker's working plan.

use std::path::Path;

use tracing::{debug, warn};

use crate::store::write_atomic;

/// Read a saved continuation token; missing, empty or unreadable files yield `None`
pub fn load_token(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let token = content.trim();
            if token.is_empty() {
                debug!(?path, "load_token: empty token file");
                None
            } else {
                debug!(?path, "load_token: found token");
                Some(token.to_string())
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(?path, error = %e, "load_token: failed to read token file");
            None
        }
    }
}

/// Persist a continuation token atomically (temp file + rename)
pub fn save_token(path: &Path, token: &str) -> std::io::Result<()> {
    debug!(?path, "save_token: called");
    write_atomic(path, format!("{}\n", token.trim()).as_bytes())
}
