//! Job engine: one pipeline run plus report persistence and export.

use std::path::PathBuf;
use std::sync::Arc;

use reposcribe_core::{
    AnalysisPipeline, Exporter, GeminiClient, GitCloner, HtmlExporter, InferenceError,
    PipelineError, ReportVariant, ReposcribeConfig, RunStats, write_report,
};
use tokio_util::sync::CancellationToken;

/// What to run.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub repo_url: String,
    pub variant: ReportVariant,
    pub export: bool,
}

/// Result of a successful engine execution.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub report_path: PathBuf,
    pub export_path: Option<PathBuf>,
    pub synthesis_failed: bool,
    pub stats: RunStats,
}

pub struct JobEngine {
    pipeline: AnalysisPipeline,
    exporter: Option<Arc<dyn Exporter>>,
    reports_dir: PathBuf,
}

impl JobEngine {
    pub fn new(
        pipeline: AnalysisPipeline,
        exporter: Option<Arc<dyn Exporter>>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            exporter,
            reports_dir: reports_dir.into(),
        }
    }

    /// Production wiring: git snapshots, Gemini inference, HTML export.
    pub fn from_config(
        config: &ReposcribeConfig,
        api_key: Option<String>,
    ) -> Result<Self, InferenceError> {
        let client = GeminiClient::from_settings(&config.inference, api_key)?;
        let pipeline = AnalysisPipeline::new(
            Arc::new(GitCloner::new()),
            Arc::new(client),
            config.pipeline.clone(),
        );
        Ok(Self::new(
            pipeline,
            Some(Arc::new(HtmlExporter)),
            config.service.reports_dir.clone(),
        ))
    }

    pub fn reports_dir(&self) -> &std::path::Path {
        &self.reports_dir
    }

    pub async fn execute(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
    ) -> Result<EngineResult, PipelineError> {
        let report = self
            .pipeline
            .run(&request.repo_url, request.variant, cancel)
            .await?;

        let report_path = write_report(
            &self.reports_dir,
            &report.repo_name,
            report.variant,
            &report.markdown,
        )
        .await
        .map_err(PipelineError::Report)?;

        let export_path = match (&self.exporter, request.export) {
            (Some(exporter), true) => exporter.export(&report_path).await,
            (None, true) => {
                tracing::warn!(job_id = %request.job_id, "Export requested but no exporter configured");
                None
            }
            (_, false) => None,
        };

        Ok(EngineResult {
            report_path,
            export_path,
            synthesis_failed: report.synthesis_failed,
            stats: report.stats,
        })
    }
}
