//! Snapshot acquisition: a scoped local copy of a remote repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

/// Bytes of git's stderr kept in a clone error.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Error)]
#[error("Failed to clone repository: {address}: {reason}")]
pub struct CloneError {
    pub address: String,
    pub reason: String,
}

/// A local, read-only copy of a repository.
///
/// The backing directory is removed when the snapshot is dropped.
#[derive(Debug)]
pub struct Snapshot {
    _dir: TempDir,
    root: PathBuf,
}

impl Snapshot {
    /// Wrap a temporary directory whose `root` holds the checked-out tree.
    pub fn new(dir: TempDir, root: PathBuf) -> Self {
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Anything that can produce a snapshot for a repository address.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn acquire(&self, address: &str) -> Result<Snapshot, CloneError>;
}

/// Shallow, single-branch clone through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCloner {
    git: PathBuf,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
        }
    }
}

impl GitCloner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    fn clone_error(address: &str, reason: impl Into<String>) -> CloneError {
        CloneError {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for GitCloner {
    async fn acquire(&self, address: &str) -> Result<Snapshot, CloneError> {
        let dir = tempfile::Builder::new()
            .prefix("reposcribe-")
            .tempdir()
            .map_err(|e| Self::clone_error(address, format!("temporary directory: {e}")))?;
        let root = dir.path().join("repo");

        let mut cmd = Command::new(&self.git);
        cmd.arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch")
            .arg("--")
            .arg(address)
            .arg(&root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(repo = %address, "Cloning repository");
        let output = cmd
            .output()
            .await
            .map_err(|e| Self::clone_error(address, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let reason = stderr_tail(&output.stderr);
            tracing::error!(repo = %address, status = %output.status, "git clone failed");
            return Err(Self::clone_error(address, reason));
        }

        Ok(Snapshot::new(dir, root))
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "git exited with an error".to_string();
    }
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
