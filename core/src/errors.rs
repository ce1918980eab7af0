//! Run-level error taxonomy.
//!
//! Only fatal conditions live here. Per-file read failures, per-chunk
//! inference failures, and (by default) synthesis failures are absorbed
//! into the report text instead.

use thiserror::Error;

use crate::snapshot::CloneError;

/// Error category for structured logging and the IPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Repository could not be fetched
    SnapshotError,
    /// Nothing eligible to analyze
    EmptyRepository,
    /// Stopped by the caller or a deadline
    Interrupted,
    /// Final inference call failed in strict mode
    SynthesisError,
    /// Report could not be persisted
    OutputError,
    /// Unexpected logic bugs/panics
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnapshotError => "SNAPSHOT_ERROR",
            Self::EmptyRepository => "EMPTY_REPOSITORY",
            Self::Interrupted => "INTERRUPTED",
            Self::SynthesisError => "SYNTHESIS_ERROR",
            Self::OutputError => "OUTPUT_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error("No code files found in repository: {address}")]
    EmptyRepository { address: String },

    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to generate project summary: {0}")]
    Synthesis(String),

    #[error("failed to write report: {0}")]
    Report(#[source] std::io::Error),

    #[error("analysis task panicked")]
    Panicked,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Clone(_) => ErrorCategory::SnapshotError,
            Self::EmptyRepository { .. } => ErrorCategory::EmptyRepository,
            Self::Cancelled | Self::Timeout(_) => ErrorCategory::Interrupted,
            Self::Synthesis(_) => ErrorCategory::SynthesisError,
            Self::Report(_) => ErrorCategory::OutputError,
            Self::Panicked | Self::Internal(_) => ErrorCategory::InternalError,
        }
    }
}
