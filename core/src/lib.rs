//! Repository analysis pipeline: fetch a snapshot, select and chunk its
//! source files, analyze each chunk with a language model, and synthesize
//! the results into a Markdown report.

pub mod absorb;
pub mod chunker;
pub mod config;
pub mod errors;
pub mod export;
pub mod inference;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod select;
pub mod snapshot;
pub mod source;
pub mod synth;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{InferenceSettings, PipelineSettings, ReposcribeConfig, ServiceSettings};
pub use errors::{ErrorCategory, PipelineError};
pub use export::{Exporter, HtmlExporter};
pub use inference::{GeminiClient, InferenceClient, InferenceError};
pub use pipeline::{AnalysisPipeline, AnalysisRun, Report, RunStats};
pub use report::{report_file_name, write_report};
pub use snapshot::{CloneError, GitCloner, Snapshot, SnapshotSource};
pub use types::{AnalysisFragment, ReportVariant, repo_name_from_address};
