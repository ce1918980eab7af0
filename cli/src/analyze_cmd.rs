//! `reposcribe analyze`: one job, run in this process.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use reposcribe_core::ReposcribeConfig;
use reposcribe_job_service::engine::JobEngine;
use reposcribe_job_service::manager::JobManager;
use reposcribe_job_service::protocol::SubmitParams;
use reposcribe_job_service::registry::{JobRecord, JobState};

#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Repository address, anything `git clone` accepts.
    #[arg(value_name = "REPO")]
    pub repo_url: String,

    /// Report variant: analysis, readme or guidance.
    #[arg(long = "output-type", short = 't', default_value = "analysis")]
    pub output_type: String,

    /// Directory for the report (overrides `service.reports_dir`).
    #[arg(long = "output-dir", short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// API key (defaults to the variable named by `inference.api_key_env`).
    #[arg(long = "api-key", short = 'k')]
    pub api_key: Option<String>,

    /// Also write an HTML rendering next to the report.
    #[arg(long = "export")]
    pub export: bool,

    /// Config file (defaults to ~/.config/reposcribe/config.toml).
    #[arg(long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Print the final job record as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl AnalyzeArgs {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = match &self.config {
            Some(path) => ReposcribeConfig::load_from_path(path),
            None => ReposcribeConfig::load(),
        }
        .context("loading configuration")?;
        if let Some(dir) = &self.output_dir {
            config.service.reports_dir = dir.clone();
        }

        let engine = JobEngine::from_config(&config, self.api_key.clone())?;
        let manager = JobManager::new(engine, &config.service);

        let job = manager
            .submit(SubmitParams {
                repo_url: self.repo_url.clone(),
                output_type: Some(self.output_type.clone()),
                export: self.export,
            })
            .await?;
        tracing::info!(
            job_id = %job.id,
            repo = %job.repo_name,
            output_type = %job.output_type,
            "Analyzing repository"
        );

        let done = tokio::select! {
            done = manager.wait(&job.id) => done?,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling job");
                manager.cancel(&job.id).await?;
                manager.wait(&job.id).await?
            }
        };

        self.report(&done)
    }

    fn report(&self, job: &JobRecord) -> anyhow::Result<()> {
        if self.json {
            crate::print_json(job);
        }
        match job.status {
            JobState::Completed => {
                if !self.json {
                    if let Some(path) = &job.report_path {
                        println!(
                            "{} written to {}",
                            job.output_type.display_name(),
                            path.display()
                        );
                    }
                    if let Some(path) = &job.export_path {
                        println!("Exported to {}", path.display());
                    } else if job.export_requested {
                        println!("Export failed; see the log for details");
                    }
                }
                Ok(())
            }
            JobState::Failed => bail!(
                "analysis failed: {}",
                job.error.as_deref().unwrap_or("unknown error")
            ),
            JobState::Running => bail!("job {} did not finish", job.id),
        }
    }
}
