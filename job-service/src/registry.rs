//! JobRegistry: process-wide map of job id to job record.
//!
//! The outer map lock is held only to insert or look up a record. Each
//! record sits behind its own lock, so a transition on one job never
//! blocks reads of another, and readers always see a whole record.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reposcribe_core::{ReportVariant, repo_name_from_address};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

/// Lifecycle state. `Running` moves once to a terminal state and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer-facing view of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub repo_url: String,
    pub repo_name: String,
    pub output_type: ReportVariant,
    pub status: JobState,
    #[serde(default)]
    pub export_requested: bool,
    /// Set only once the job has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
    /// Set only once the job has failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339, UTC.
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Broadcast when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalNotification {
    pub job_id: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("job already terminal: {job_id} ({status})")]
    AlreadyTerminal { job_id: String, status: JobState },
}

struct Entry {
    seq: u64,
    record: Arc<RwLock<JobRecord>>,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Entry>>,
    next_seq: AtomicU64,
    terminal_tx: broadcast::Sender<TerminalNotification>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (terminal_tx, _) = broadcast::channel(64);
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            terminal_tx,
        }
    }

    /// Allocate a fresh record in `running` state and return its id.
    pub async fn create(&self, repo_url: &str, output_type: ReportVariant, export: bool) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            repo_url: repo_url.to_string(),
            repo_name: repo_name_from_address(repo_url),
            output_type,
            status: JobState::Running,
            export_requested: export,
            report_path: None,
            export_path: None,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
        };
        let entry = Entry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            record: Arc::new(RwLock::new(record)),
        };
        self.jobs.write().await.insert(id.clone(), entry);
        tracing::info!(job_id = %id, repo = %repo_url, variant = %output_type, "Job created");
        id
    }

    async fn handle(&self, job_id: &str) -> Result<Arc<RwLock<JobRecord>>, RegistryError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|e| Arc::clone(&e.record))
            .ok_or_else(|| RegistryError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    pub async fn get(&self, job_id: &str) -> Result<JobRecord, RegistryError> {
        let record = self.handle(job_id).await?;
        let snapshot = record.read().await.clone();
        Ok(snapshot)
    }

    pub async fn transition_to_completed(
        &self,
        job_id: &str,
        report_path: PathBuf,
        export_path: Option<PathBuf>,
    ) -> Result<JobRecord, RegistryError> {
        self.finish(job_id, |record| {
            record.status = JobState::Completed;
            record.report_path = Some(report_path);
            record.export_path = export_path;
        })
        .await
    }

    pub async fn transition_to_failed(
        &self,
        job_id: &str,
        description: impl Into<String>,
    ) -> Result<JobRecord, RegistryError> {
        let description = description.into();
        self.finish(job_id, |record| {
            record.status = JobState::Failed;
            record.error = Some(description);
        })
        .await
    }

    async fn finish(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut JobRecord),
    ) -> Result<JobRecord, RegistryError> {
        let handle = self.handle(job_id).await?;
        let updated = {
            let mut record = handle.write().await;
            if record.status.is_terminal() {
                return Err(RegistryError::AlreadyTerminal {
                    job_id: job_id.to_string(),
                    status: record.status,
                });
            }
            apply(&mut record);
            record.finished_at = Some(chrono::Utc::now().to_rfc3339());
            record.clone()
        };

        tracing::info!(job_id = %job_id, status = %updated.status, "Job finished");
        // Ignore error if no subscribers
        let _ = self.terminal_tx.send(TerminalNotification {
            job_id: updated.id.clone(),
            status: updated.status,
            report_path: updated.report_path.clone(),
            error: updated.error.clone(),
        });
        Ok(updated)
    }

    /// All records, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut handles: Vec<(u64, Arc<RwLock<JobRecord>>)> = self
            .jobs
            .read()
            .await
            .values()
            .map(|e| (e.seq, Arc::clone(&e.record)))
            .collect();
        handles.sort_by_key(|(seq, _)| std::cmp::Reverse(*seq));

        let mut records = Vec::with_capacity(handles.len());
        for (_, record) in handles {
            records.push(record.read().await.clone());
        }
        records
    }

    pub fn subscribe_terminal(&self) -> broadcast::Receiver<TerminalNotification> {
        self.terminal_tx.subscribe()
    }

    pub async fn running_count(&self) -> usize {
        self.list()
            .await
            .iter()
            .filter(|r| r.status == JobState::Running)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
