//! Configuration loading
//!
//! Loads configuration from `~/.config/reposcribe/config.toml` (or
//! `REPOSCRIBE_CONFIG` env). A missing file yields defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::inference::GOOGLE_API_BASE;
use crate::source::DEFAULT_MAX_FILE_BYTES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReposcribeConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub inference: InferenceSettings,

    #[serde(default)]
    pub service: ServiceSettings,
}

/// Analysis pipeline tuning.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Files analyzed per extension; the rest are skipped.
    #[serde(default = "default_max_files_per_language")]
    pub max_files_per_language: usize,

    /// Maximum characters per inference request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Files above this size get a sentinel instead of analysis.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Fail the job when the synthesis call fails instead of writing a
    /// placeholder report.
    #[serde(default)]
    pub strict_synthesis: bool,
}

fn default_max_files_per_language() -> usize {
    10
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_files_per_language: default_max_files_per_language(),
            chunk_size: default_chunk_size(),
            max_file_bytes: default_max_file_bytes(),
            strict_synthesis: false,
        }
    }
}

/// Inference backend settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InferenceSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub top_p: Option<f32>,
}

fn default_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

fn default_base_url() -> String {
    GOOGLE_API_BASE.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_output_tokens() -> u32 {
    8192
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            top_p: None,
        }
    }
}

/// Job service settings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Directory receiving `{repo}_{suffix}.md` reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Jobs allowed to run the pipeline at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit per job; unset means no limit.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// IPC socket override.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_max_concurrent_jobs() -> usize {
    4
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: None,
            socket_path: None,
        }
    }
}

impl ReposcribeConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "REPOSCRIBE_CONFIG";

    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `REPOSCRIBE_CONFIG` environment variable
    /// 2. `~/.config/reposcribe/config.toml`
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(path = %path.display(), "Config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: ReposcribeConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("reposcribe")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.max_files_per_language == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_files_per_language must be greater than zero".to_string(),
            ));
        }
        if self.service.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "service.max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }
        if self.service.job_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "service.job_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(temp) = self.inference.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            tracing::warn!(temp, "Temperature outside 0.0-2.0, the API may reject requests");
        }
        Ok(())
    }
}
