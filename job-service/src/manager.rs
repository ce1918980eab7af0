//! JobManager: submission, execution and cancellation of analysis jobs.
//!
//! `submit` registers the job and returns at once. The spawned runner waits
//! for a worker permit, runs the engine in a nested task so a panic cannot
//! take the runner down, races it against cancellation and the optional
//! timeout, then makes exactly one terminal transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reposcribe_async_utils::{CancelErr, OrCancelExt};
use reposcribe_core::{PipelineError, ReportVariant, ServiceSettings};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineResult, JobEngine, JobRequest};
use crate::protocol::{CancelResult, ListParams, ServiceStatusResult, SubmitParams};
use crate::registry::{JobRecord, JobRegistry, JobState, RegistryError, TerminalNotification};

/// Error type for manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("infrastructure error: {0}")]
    Infra(String),
}

impl From<RegistryError> for ManagerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { job_id } => Self::JobNotFound { job_id },
            other => Self::Infra(other.to_string()),
        }
    }
}

pub struct JobManager {
    registry: Arc<JobRegistry>,
    engine: Arc<JobEngine>,
    permits: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    job_timeout: Option<Duration>,
    /// Cancellation tokens of jobs still running.
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    started_at: Instant,
}

impl JobManager {
    pub fn new(engine: JobEngine, settings: &ServiceSettings) -> Self {
        let max = settings.max_concurrent_jobs.max(1);
        Self {
            registry: Arc::new(JobRegistry::new()),
            engine: Arc::new(engine),
            permits: Arc::new(Semaphore::new(max)),
            max_concurrent_jobs: max,
            job_timeout: settings.job_timeout_secs.map(Duration::from_secs),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Subscribe to terminal notifications for --wait support.
    pub fn subscribe_terminal(&self) -> broadcast::Receiver<TerminalNotification> {
        self.registry.subscribe_terminal()
    }

    /// Service uptime in seconds.
    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Register a job and start it in the background.
    pub async fn submit(&self, params: SubmitParams) -> Result<JobRecord, ManagerError> {
        let repo_url = params.repo_url.trim();
        if repo_url.is_empty() {
            return Err(ManagerError::InvalidRequest {
                reason: "repo_url is required".to_string(),
            });
        }
        let variant = params
            .output_type
            .as_deref()
            .map(ReportVariant::parse_lenient)
            .unwrap_or_default();

        let job_id = self.registry.create(repo_url, variant, params.export).await;
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .await
            .insert(job_id.clone(), token.clone());

        let request = JobRequest {
            job_id: job_id.clone(),
            repo_url: repo_url.to_string(),
            variant,
            export: params.export,
        };
        tokio::spawn(run_job(
            Arc::clone(&self.registry),
            Arc::clone(&self.engine),
            Arc::clone(&self.permits),
            Arc::clone(&self.tokens),
            self.job_timeout,
            request,
            token,
        ));

        Ok(self.registry.get(&job_id).await?)
    }

    pub async fn get(&self, job_id: &str) -> Result<JobRecord, ManagerError> {
        Ok(self.registry.get(job_id).await?)
    }

    pub async fn list(&self, params: &ListParams) -> (Vec<JobRecord>, usize) {
        let mut jobs = self.registry.list().await;
        if let Some(status) = params.status {
            jobs.retain(|j| j.status == status);
        }
        let total = jobs.len();
        if let Some(limit) = params.limit {
            jobs.truncate(limit);
        }
        (jobs, total)
    }

    /// Request cancellation. The job turns `failed: cancelled` once its
    /// runner observes the token.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelResult, ManagerError> {
        let job = self.registry.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(CancelResult {
                job_id: job.id,
                status: job.status,
                cancel_requested: false,
            });
        }

        let token = self.tokens.lock().await.get(job_id).cloned();
        let cancel_requested = match token {
            Some(token) => {
                tracing::info!(job_id = %job_id, "Cancelling job");
                token.cancel();
                true
            }
            None => false,
        };
        Ok(CancelResult {
            job_id: job_id.to_string(),
            status: JobState::Running,
            cancel_requested,
        })
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait(&self, job_id: &str) -> Result<JobRecord, ManagerError> {
        let mut rx = self.registry.subscribe_terminal();
        loop {
            let job = self.registry.get(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            match rx.recv().await {
                Ok(note) if note.job_id == job_id => return Ok(self.registry.get(job_id).await?),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ManagerError::Infra("terminal channel closed".to_string()));
                }
            }
        }
    }

    pub async fn status(&self) -> ServiceStatusResult {
        ServiceStatusResult {
            uptime_s: self.uptime_s(),
            running_jobs: self.registry.running_count().await,
            total_jobs: self.registry.len().await,
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }
}

async fn run_job(
    registry: Arc<JobRegistry>,
    engine: Arc<JobEngine>,
    permits: Arc<Semaphore>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    timeout: Option<Duration>,
    request: JobRequest,
    token: CancellationToken,
) {
    let job_id = request.job_id.clone();
    let outcome = execute_with_limits(engine, permits, timeout, request, &token).await;
    tokens.lock().await.remove(&job_id);

    let transition = match outcome {
        Ok(result) => {
            if result.synthesis_failed {
                tracing::warn!(job_id = %job_id, "Report written with synthesis placeholder");
            }
            registry
                .transition_to_completed(&job_id, result.report_path, result.export_path)
                .await
        }
        Err(err) => {
            tracing::error!(
                job_id = %job_id,
                category = err.category().as_str(),
                error = %err,
                "Job failed"
            );
            registry.transition_to_failed(&job_id, err.to_string()).await
        }
    };
    if let Err(err) = transition {
        tracing::error!(job_id = %job_id, error = %err, "Terminal transition rejected");
    }
}

async fn execute_with_limits(
    engine: Arc<JobEngine>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    request: JobRequest,
    token: &CancellationToken,
) -> Result<EngineResult, PipelineError> {
    let _permit = match permits.acquire_owned().or_cancel(token).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_closed)) => return Err(PipelineError::Internal("worker pool closed".to_string())),
        Err(_) => return Err(PipelineError::Cancelled),
    };
    tracing::info!(job_id = %request.job_id, repo = %request.repo_url, "Job started");

    let inner_token = token.child_token();
    let task = tokio::spawn({
        let inner_token = inner_token.clone();
        async move { engine.execute(&request, &inner_token).await }
    });
    let abort = task.abort_handle();

    match task.or_cancel_within(token, timeout).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(PipelineError::Panicked),
        Ok(Err(_)) => Err(PipelineError::Cancelled),
        Err(CancelErr::Cancelled) => {
            abort.abort();
            Err(PipelineError::Cancelled)
        }
        Err(CancelErr::TimedOut(limit)) => {
            inner_token.cancel();
            abort.abort();
            Err(PipelineError::Timeout(limit.as_secs()))
        }
    }
}
