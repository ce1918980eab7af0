//! Inference Client Adapter: one prompt in, one text result or a typed failure out.

mod gemini;

pub use gemini::{GOOGLE_API_BASE, GeminiClient, GeminiConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a single inference request.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// No API key was configured.
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    /// The API key cannot be sent as an HTTP header value.
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiResponse {
        status: u16,
        message: String,
        error_type: Option<String>,
    },

    /// The prompt was refused before generation.
    #[error("Prompt blocked: {0}")]
    PromptBlocked(String),

    /// Generation stopped on a safety filter.
    #[error("Response blocked due to safety concerns")]
    SafetyBlocked,

    /// The response held no text.
    #[error("Empty response from model")]
    EmptyResponse,

    /// Failed to parse API response.
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// A text-generation backend.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> InferenceResult<String>;
}
