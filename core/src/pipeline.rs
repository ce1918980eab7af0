//! Analysis Pipeline: snapshot, select, read, chunk, infer, synthesize.
//!
//! Processing inside one run is strictly sequential, with at most one
//! inference request in flight. Only the conditions in [`PipelineError`]
//! stop a run; everything else degrades into inline markers.

use std::sync::Arc;

use reposcribe_async_utils::OrCancelExt;
use tokio_util::sync::CancellationToken;

use crate::absorb::{Absorbed, absorb, chunk_error_marker};
use crate::chunker::chunk_text;
use crate::config::PipelineSettings;
use crate::errors::PipelineError;
use crate::inference::InferenceClient;
use crate::prompts::analysis_prompt;
use crate::select::{Selection, select_files};
use crate::snapshot::SnapshotSource;
use crate::source::{SourceText, read_source};
use crate::synth::synthesize;
use crate::types::{AnalysisFragment, ChunkContext, FileRecord, ReportVariant, repo_name_from_address};

/// Counters for one run, logged when analysis finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub buckets: usize,
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub files_capped: usize,
    pub files_oversized: usize,
    pub chunks: usize,
    pub chunk_failures: usize,
}

/// Per-file analysis of one repository.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub repo_name: String,
    pub fragments: Vec<AnalysisFragment>,
    pub stats: RunStats,
}

/// Synthesized report, not yet persisted.
#[derive(Debug, Clone)]
pub struct Report {
    pub repo_name: String,
    pub variant: ReportVariant,
    pub markdown: String,
    /// The synthesis call failed and `markdown` is the placeholder.
    pub synthesis_failed: bool,
    pub stats: RunStats,
}

pub struct AnalysisPipeline {
    source: Arc<dyn SnapshotSource>,
    client: Arc<dyn InferenceClient>,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        client: Arc<dyn InferenceClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            client,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Analyze and synthesize one repository into a report variant.
    pub async fn run(
        &self,
        address: &str,
        variant: ReportVariant,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        let analysis = self.analyze(address, cancel).await?;

        let outcome = synthesize(
            self.client.as_ref(),
            &analysis.fragments,
            &analysis.repo_name,
            variant,
        )
        .or_cancel(cancel)
        .await
        .map_err(|_| PipelineError::Cancelled)?;

        let synthesis_failed = outcome.is_annotated();
        if let Absorbed::Annotated { reason, .. } = &outcome
            && self.settings.strict_synthesis
        {
            return Err(PipelineError::Synthesis(reason.clone()));
        }

        Ok(Report {
            repo_name: analysis.repo_name,
            variant,
            markdown: outcome.into_text(),
            synthesis_failed,
            stats: analysis.stats,
        })
    }

    /// Produce the ordered per-file fragments for a repository.
    ///
    /// The snapshot is released before this returns, on every path.
    pub async fn analyze(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRun, PipelineError> {
        let repo_name = repo_name_from_address(address);
        let snapshot = self
            .source
            .acquire(address)
            .or_cancel(cancel)
            .await
            .map_err(|_| PipelineError::Cancelled)??;

        let root = snapshot.root().to_path_buf();
        let selection = tokio::task::spawn_blocking(move || select_files(&root))
            .await
            .map_err(|e| PipelineError::Internal(format!("file selection failed: {e}")))?;

        if selection.is_empty() {
            tracing::warn!(repo = %repo_name, "No code files found");
            return Err(PipelineError::EmptyRepository {
                address: address.to_string(),
            });
        }

        let (fragments, stats) = self.analyze_selection(selection, cancel).await?;
        drop(snapshot);

        tracing::info!(
            repo = %repo_name,
            buckets = stats.buckets,
            files_analyzed = stats.files_analyzed,
            files_skipped = stats.files_skipped,
            files_capped = stats.files_capped,
            chunks = stats.chunks,
            chunk_failures = stats.chunk_failures,
            "Repository analysis finished"
        );

        Ok(AnalysisRun {
            repo_name,
            fragments,
            stats,
        })
    }

    async fn analyze_selection(
        &self,
        selection: Selection,
        cancel: &CancellationToken,
    ) -> Result<(Vec<AnalysisFragment>, RunStats), PipelineError> {
        let cap = self.settings.max_files_per_language;
        let mut stats = RunStats {
            buckets: selection.buckets.len(),
            ..Default::default()
        };
        let mut fragments = Vec::new();

        for bucket in selection.buckets {
            let total = bucket.files.len();
            if total > cap {
                tracing::info!(
                    language = bucket.language(),
                    total,
                    cap,
                    "Limiting files for language"
                );
                stats.files_capped += total - cap;
            }
            tracing::info!(
                language = bucket.language(),
                files = total.min(cap),
                "Analyzing files"
            );

            for record in bucket.files.iter().take(cap) {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                match self.analyze_file(record, cancel, &mut stats).await? {
                    Some(fragment) => {
                        stats.files_analyzed += 1;
                        fragments.push(fragment);
                    }
                    None => stats.files_skipped += 1,
                }
            }
        }

        Ok((fragments, stats))
    }

    /// `Ok(None)` when the file is skipped without a fragment.
    async fn analyze_file(
        &self,
        record: &FileRecord,
        cancel: &CancellationToken,
        stats: &mut RunStats,
    ) -> Result<Option<AnalysisFragment>, PipelineError> {
        let text = match read_source(record, self.settings.max_file_bytes).await {
            SourceText::Text(text) => text,
            SourceText::Oversized(sentinel) => {
                tracing::info!(file = %record.rel_path, size = record.size, "File too large, not analyzed");
                stats.files_oversized += 1;
                return Ok(Some(AnalysisFragment {
                    rel_path: record.rel_path.clone(),
                    results: vec![sentinel],
                }));
            }
            SourceText::Unreadable(_) => return Ok(None),
        };
        if text.is_empty() {
            return Ok(None);
        }

        let chunks = chunk_text(&text, self.settings.chunk_size);
        let count = chunks.len();
        let mut results = Vec::with_capacity(count);
        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let ctx = ChunkContext {
                rel_path: &record.rel_path,
                index,
                count,
                text: chunk,
            };
            tracing::debug!(file = %record.rel_path, chunk = index + 1, of = count, "Analyzing chunk");

            let response = self
                .client
                .generate(&analysis_prompt(&ctx))
                .or_cancel(cancel)
                .await
                .map_err(|_| PipelineError::Cancelled)?;
            let outcome = absorb(response, &ctx.label(), chunk_error_marker);
            stats.chunks += 1;
            if outcome.is_annotated() {
                stats.chunk_failures += 1;
            }
            results.push(outcome.into_text());
        }

        Ok(Some(AnalysisFragment {
            rel_path: record.rel_path.clone(),
            results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureSource, ScriptedInference};
    use pretty_assertions::assert_eq;

    fn pipeline(
        source: FixtureSource,
        client: ScriptedInference,
        settings: PipelineSettings,
    ) -> (AnalysisPipeline, Arc<FixtureSource>, Arc<ScriptedInference>) {
        let source = Arc::new(source);
        let client = Arc::new(client);
        (
            AnalysisPipeline::new(source.clone(), client.clone(), settings),
            source,
            client,
        )
    }

    const ADDR: &str = "https://example.com/acme/tool.git";

    #[tokio::test]
    async fn clone_failure_is_fatal() {
        let (p, _, client) = pipeline(
            FixtureSource::new().failing("repository not found"),
            ScriptedInference::new(),
            PipelineSettings::default(),
        );

        let err = p.analyze(ADDR, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Clone(_)));
        assert!(err.to_string().starts_with("Failed to clone repository:"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn only_binaries_and_docs_is_empty_repository() {
        let (p, source, client) = pipeline(
            FixtureSource::new()
                .with_bytes("logo.png", vec![0x89, b'P', b'N', b'G'])
                .with_file("README.md", "# tool"),
            ScriptedInference::new(),
            PipelineSettings::default(),
        );

        let err = p.analyze(ADDR, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), format!("No code files found in repository: {ADDR}"));
        assert_eq!(client.call_count(), 0);
        for root in source.acquired_roots() {
            assert!(!root.exists(), "snapshot not released: {}", root.display());
        }
    }

    #[tokio::test]
    async fn fragments_follow_processing_order() {
        let (p, source, _) = pipeline(
            FixtureSource::new()
                .with_file("b.py", "print('b')")
                .with_file("a.rs", "fn a() {}")
                .with_file("c.py", "print('c')"),
            ScriptedInference::new()
                .respond_when_contains("file a.rs", "rust fn")
                .respond_when_contains("file b.py", "python b")
                .respond_when_contains("file c.py", "python c"),
            PipelineSettings::default(),
        );

        let run = p.analyze(ADDR, &CancellationToken::new()).await.unwrap();

        assert_eq!(run.repo_name, "tool");
        let order: Vec<_> = run
            .fragments
            .iter()
            .map(|f| (f.rel_path.as_str(), f.results[0].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("a.rs", "rust fn"), ("b.py", "python b"), ("c.py", "python c")]
        );
        assert_eq!(run.stats.buckets, 2);
        assert_eq!(run.stats.files_analyzed, 3);
        assert!(source.acquired_roots().iter().all(|r| !r.exists()));
    }

    #[tokio::test]
    async fn chunk_failure_is_marked_inline_and_run_continues() {
        let big = "x".repeat(25);
        let (p, _, client) = pipeline(
            FixtureSource::new()
                .with_file("a.py", &big)
                .with_file("b.py", "ok"),
            ScriptedInference::new().fail_when_contains("file a.py (part 2/3)", "quota exceeded"),
            PipelineSettings {
                chunk_size: 10,
                ..Default::default()
            },
        );

        let run = p.analyze(ADDR, &CancellationToken::new()).await.unwrap();

        assert_eq!(client.call_count(), 4);
        assert_eq!(run.fragments.len(), 2);
        let a = &run.fragments[0];
        assert_eq!(a.results.len(), 3);
        assert_eq!(a.results[0], "Scripted analysis.");
        assert_eq!(
            a.results[1],
            "[Error analyzing code: API error (429): quota exceeded]"
        );
        assert_eq!(run.stats.chunk_failures, 1);
        assert_eq!(run.stats.chunks, 4);
    }

    #[tokio::test]
    async fn per_language_cap_limits_inference_calls() {
        let mut source = FixtureSource::new();
        for i in 0..15 {
            source = source.with_file(&format!("m{i:02}.py"), "pass");
        }
        let (p, _, client) = pipeline(source, ScriptedInference::new(), PipelineSettings::default());

        let run = p.analyze(ADDR, &CancellationToken::new()).await.unwrap();

        assert_eq!(run.fragments.len(), 10);
        assert_eq!(client.call_count(), 10);
        assert_eq!(run.fragments[9].rel_path, "m09.py");
        assert_eq!(run.stats.files_capped, 5);
    }

    #[tokio::test]
    async fn empty_and_oversized_files() {
        let (p, _, client) = pipeline(
            FixtureSource::new()
                .with_file("empty.py", "")
                .with_file("huge.py", &"y".repeat(64))
                .with_file("small.py", "pass"),
            ScriptedInference::new(),
            PipelineSettings {
                max_file_bytes: 32,
                ..Default::default()
            },
        );

        let run = p.analyze(ADDR, &CancellationToken::new()).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(run.fragments.len(), 2);
        assert_eq!(run.fragments[0].rel_path, "huge.py");
        assert_eq!(run.fragments[0].results, vec!["[File too large: huge.py]".to_string()]);
        assert_eq!(run.stats.files_skipped, 1);
        assert_eq!(run.stats.files_oversized, 1);
    }

    #[tokio::test]
    async fn latin1_file_is_analyzed() {
        let (p, _, client) = pipeline(
            FixtureSource::new().with_bytes("legacy.c", vec![b'/', b'/', b' ', 0xE9]),
            ScriptedInference::new(),
            PipelineSettings::default(),
        );

        p.analyze(ADDR, &CancellationToken::new()).await.unwrap();
        assert!(client.prompts()[0].contains("// é"));
    }

    #[tokio::test]
    async fn cancellation_between_chunks_stops_the_run() {
        let token = CancellationToken::new();
        let (p, source, client) = pipeline(
            FixtureSource::new()
                .with_file("a.py", "one")
                .with_file("b.py", "two")
                .with_file("c.py", "three"),
            ScriptedInference::new().cancel_on_call(1, token.clone()),
            PipelineSettings::default(),
        );

        let err = p.analyze(ADDR, &token).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(client.call_count(), 1);
        assert!(source.acquired_roots().iter().all(|r| !r.exists()));
    }

    #[tokio::test]
    async fn run_synthesizes_requested_variant() {
        let (p, _, client) = pipeline(
            FixtureSource::new().with_file("main.go", "package main"),
            ScriptedInference::new().respond_when_contains("CODE ANALYSES", "## Next Steps"),
            PipelineSettings::default(),
        );

        let report = p
            .run(ADDR, ReportVariant::Guidance, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.markdown, "## Next Steps");
        assert!(!report.synthesis_failed);
        assert_eq!(client.call_count(), 2);
        assert!(client.prompts()[1].contains("## Analysis of main.go"));
    }

    #[tokio::test]
    async fn synthesis_failure_is_soft_by_default() {
        let (p, _, _) = pipeline(
            FixtureSource::new().with_file("main.go", "package main"),
            ScriptedInference::new().fail_when_contains("CODE ANALYSES", "overloaded"),
            PipelineSettings::default(),
        );

        let report = p
            .run(ADDR, ReportVariant::Analysis, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.synthesis_failed);
        assert!(report.markdown.starts_with("# Error Generating Project Summary"));
    }

    #[tokio::test]
    async fn strict_synthesis_fails_the_run() {
        let (p, _, _) = pipeline(
            FixtureSource::new().with_file("main.go", "package main"),
            ScriptedInference::new().fail_when_contains("CODE ANALYSES", "overloaded"),
            PipelineSettings {
                strict_synthesis: true,
                ..Default::default()
            },
        );

        let err = p
            .run(ADDR, ReportVariant::Analysis, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
    }
}
