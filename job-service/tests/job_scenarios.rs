#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Job lifecycle scenarios driven through the manager with scripted
//! snapshots and inference.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use reposcribe_core::testing::{FixtureSource, ScriptedInference};
use reposcribe_core::{AnalysisPipeline, PipelineSettings, ReportVariant, ServiceSettings};
use reposcribe_job_service::engine::JobEngine;
use reposcribe_job_service::manager::JobManager;
use reposcribe_job_service::protocol::SubmitParams;
use reposcribe_job_service::registry::{JobRecord, JobState};
use tempfile::TempDir;

const ADDR: &str = "https://github.com/acme/widget";

struct Harness {
    reports: TempDir,
    source: Arc<FixtureSource>,
    inference: Arc<ScriptedInference>,
    manager: JobManager,
}

impl Harness {
    fn new(source: FixtureSource, inference: ScriptedInference) -> Self {
        let reports = TempDir::new().unwrap();
        let source = Arc::new(source);
        let inference = Arc::new(inference);
        let pipeline = AnalysisPipeline::new(
            source.clone(),
            inference.clone(),
            PipelineSettings::default(),
        );
        let manager = JobManager::new(
            JobEngine::new(pipeline, None, reports.path()),
            &ServiceSettings::default(),
        );
        Self {
            reports,
            source,
            inference,
            manager,
        }
    }

    async fn run(&self, output_type: Option<&str>) -> JobRecord {
        let job = self
            .manager
            .submit(SubmitParams {
                repo_url: ADDR.to_string(),
                output_type: output_type.map(str::to_string),
                export: false,
            })
            .await
            .unwrap();
        self.manager.wait(&job.id).await.unwrap()
    }

    fn report_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.reports.path())
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[tokio::test]
async fn clone_failure_fails_job_without_report() {
    let h = Harness::new(
        FixtureSource::new().failing("repository not found"),
        ScriptedInference::new(),
    );

    let job = h.run(Some("readme")).await;

    assert_eq!(job.status, JobState::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("Failed to clone repository"), "{error}");
    assert!(error.contains("repository not found"), "{error}");
    assert_eq!(job.report_path, None);
    assert!(h.report_files().is_empty());
    assert_eq!(h.inference.call_count(), 0);
}

#[tokio::test]
async fn repository_with_only_images_and_docs_fails() {
    let h = Harness::new(
        FixtureSource::new()
            .with_bytes("logo.png", vec![0x89, b'P', b'N', b'G'])
            .with_file("README.md", "# Widget"),
        ScriptedInference::new(),
    );

    let job = h.run(None).await;

    assert_eq!(job.status, JobState::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some(format!("No code files found in repository: {ADDR}").as_str())
    );
    assert!(h.report_files().is_empty());
}

#[tokio::test]
async fn one_failed_chunk_still_completes() {
    let h = Harness::new(
        FixtureSource::new()
            .with_file("a.py", "print('a')")
            .with_file("b.py", "print('b')")
            .with_file("c.py", "print('c')"),
        ScriptedInference::new()
            .fail_when_contains("file b.py (part", "quota exhausted")
            .respond_when_contains("technical documentation expert", "# Widget analysis"),
    );

    let job = h.run(Some("analysis")).await;

    assert_eq!(job.status, JobState::Completed);
    assert_eq!(h.report_files(), vec!["widget_analysis.md".to_string()]);

    let synthesis = h.inference.prompts().pop().unwrap();
    assert_eq!(synthesis.matches("[Error analyzing code:").count(), 1);
    assert!(synthesis.contains("## Analysis of b.py\n\n[Error analyzing code:"));
    let positions: Vec<usize> = ["a.py", "b.py", "c.py"]
        .iter()
        .map(|name| {
            synthesis
                .find(&format!("## Analysis of {name}"))
                .unwrap_or_else(|| panic!("no fragment for {name}"))
        })
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "fragments out of order: {positions:?}"
    );
}

#[tokio::test]
async fn panicking_inference_fails_job_and_releases_snapshot() {
    let h = Harness::new(
        FixtureSource::new().with_file("main.py", "print('hi')"),
        ScriptedInference::new().panic_when_contains("file main.py", "model exploded"),
    );

    let job = h.run(None).await;

    assert_eq!(job.status, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("analysis task panicked"));
    assert!(h.report_files().is_empty());
    let roots = h.source.acquired_roots();
    assert_eq!(roots.len(), 1);
    assert!(!roots[0].exists(), "snapshot left behind: {}", roots[0].display());
}

#[tokio::test]
async fn unknown_output_type_runs_as_analysis() {
    let h = Harness::new(
        FixtureSource::new().with_file("main.go", "package main"),
        ScriptedInference::new(),
    );

    let job = h.run(Some("brochure")).await;

    assert_eq!(job.output_type, ReportVariant::Analysis);
    assert_eq!(job.status, JobState::Completed);
    assert_eq!(h.report_files(), vec!["widget_analysis.md".to_string()]);
    let synthesis = h.inference.prompts().pop().unwrap();
    assert!(synthesis.contains("technical documentation expert"));
}

#[tokio::test]
async fn per_language_cap_applies_to_jobs() {
    let mut source = FixtureSource::new();
    for i in 0..15 {
        source = source.with_file(&format!("mod_{i:02}.js"), "export {}");
    }
    let h = Harness::new(source, ScriptedInference::new());

    let job = h.run(Some("guidance")).await;

    assert_eq!(job.status, JobState::Completed);
    // Ten file analyses plus one synthesis call.
    assert_eq!(h.inference.call_count(), 11);
    assert_eq!(h.report_files(), vec!["widget_guidance.md".to_string()]);
}

#[tokio::test]
async fn terminal_record_is_stable() {
    let h = Harness::new(
        FixtureSource::new().with_file("lib.rs", "pub fn f() {}"),
        ScriptedInference::new(),
    );

    let job = h.run(None).await;
    let again = h.manager.get(&job.id).await.unwrap();
    let third = h.manager.get(&job.id).await.unwrap();

    assert_eq!(job, again);
    assert_eq!(again, third);
    assert!(job.finished_at.is_some());
}
