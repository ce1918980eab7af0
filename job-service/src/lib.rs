//! `reposcribe-job-service`: asynchronous report jobs.
//!
//! Holds the in-memory job registry and the runner that drives the
//! analysis pipeline in the background. The `reposcribe-jobd` binary
//! exposes both over a Unix domain socket at
//! `$XDG_RUNTIME_DIR/reposcribe.sock`, speaking newline-delimited
//! JSON-RPC-lite.

pub mod client;
pub mod engine;
pub mod ipc;
pub mod manager;
pub mod protocol;
pub mod registry;

use std::path::{Path, PathBuf};

/// Protocol version for the job service IPC.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default socket filename.
pub const SOCKET_FILENAME: &str = "reposcribe.sock";

/// Get the default socket path using XDG_RUNTIME_DIR.
///
/// Falls back to `/tmp/reposcribe-<username>.sock` if XDG_RUNTIME_DIR is not set.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join(SOCKET_FILENAME)
    } else {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        PathBuf::from(format!("/tmp/reposcribe-{user}.sock"))
    }
}

/// Explicit path first, then the configured one, then the default.
pub fn resolve_socket_path(explicit: Option<&Path>, configured: Option<&Path>) -> PathBuf {
    explicit
        .or(configured)
        .map(Path::to_path_buf)
        .unwrap_or_else(default_socket_path)
}
