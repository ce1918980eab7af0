//! Turning soft failures into inline text so a run keeps going.

use std::fmt::Display;

/// Result of absorbing a fallible step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Absorbed {
    Clean(String),
    /// The step failed; `text` is the marker that stands in for its output.
    Annotated { text: String, reason: String },
}

impl Absorbed {
    pub fn is_annotated(&self) -> bool {
        matches!(self, Self::Annotated { .. })
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Clean(text) | Self::Annotated { text, .. } => text,
        }
    }
}

/// Keep a success as-is; log a failure and replace it with `annotate(err)`.
pub fn absorb<E: Display>(
    result: Result<String, E>,
    what: &str,
    annotate: impl FnOnce(&str) -> String,
) -> Absorbed {
    match result {
        Ok(text) => Absorbed::Clean(text),
        Err(err) => {
            let reason = err.to_string();
            tracing::warn!(step = what, error = %reason, "Step failed, continuing with marker");
            Absorbed::Annotated {
                text: annotate(&reason),
                reason,
            }
        }
    }
}

/// Inline marker for a chunk whose inference call failed.
pub fn chunk_error_marker(reason: &str) -> String {
    format!("[Error analyzing code: {reason}]")
}

/// Placeholder report for a failed synthesis call.
pub fn synthesis_error_report(reason: &str) -> String {
    format!("# Error Generating Project Summary\n\nAn error occurred: {reason}")
}
