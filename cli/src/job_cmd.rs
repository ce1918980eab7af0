//! Job service subcommands.
//!
//! Thin IPC client that connects to `reposcribe-jobd` via Unix socket.
//!
//! ## Commands
//!
//! - `reposcribe job submit <REPO> [--output-type T] [--export] [--wait]`
//! - `reposcribe job status <JOB_ID>`
//! - `reposcribe job list [--limit N] [--status S]`
//! - `reposcribe job cancel <JOB_ID>`
//! - `reposcribe service status`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use reposcribe_core::ReposcribeConfig;
use reposcribe_job_service::client::ServiceClient;
use reposcribe_job_service::protocol::{ListParams, SubmitParams};
use reposcribe_job_service::registry::{JobRecord, JobState};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection flags shared by every service command.
#[derive(Debug, Args)]
pub struct ConnArgs {
    /// Service socket (defaults to `service.socket_path`, then
    /// $XDG_RUNTIME_DIR/reposcribe.sock).
    #[arg(long = "socket", env = "REPOSCRIBE_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl ConnArgs {
    async fn connect(&self) -> anyhow::Result<ServiceClient> {
        let configured = match ReposcribeConfig::load() {
            Ok(config) => config.service.socket_path,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config: {e}");
                None
            }
        };
        let path = reposcribe_job_service::resolve_socket_path(
            self.socket.as_deref(),
            configured.as_deref(),
        );
        Ok(ServiceClient::connect(&path).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// job
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
pub struct JobCli {
    #[command(subcommand)]
    pub command: JobSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum JobSubcommand {
    /// Submit a repository for analysis.
    Submit(SubmitArgs),
    /// Show one job.
    Status(JobIdArgs),
    /// List jobs, newest first.
    List(ListArgs),
    /// Cancel a running job.
    Cancel(JobIdArgs),
}

#[derive(Debug, Parser)]
pub struct SubmitArgs {
    #[arg(value_name = "REPO")]
    pub repo_url: String,

    /// Report variant: analysis, readme or guidance.
    #[arg(long = "output-type", short = 't')]
    pub output_type: Option<String>,

    /// Also write an HTML rendering.
    #[arg(long = "export")]
    pub export: bool,

    /// Poll until the job finishes.
    #[arg(long = "wait", short = 'w')]
    pub wait: bool,

    #[command(flatten)]
    pub conn: ConnArgs,
}

#[derive(Debug, Parser)]
pub struct JobIdArgs {
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    #[command(flatten)]
    pub conn: ConnArgs,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    #[arg(long = "limit", default_value = "20")]
    pub limit: usize,

    /// Only jobs in this state: running, completed or failed.
    #[arg(long = "status", value_parser = parse_state)]
    pub status: Option<JobState>,

    #[command(flatten)]
    pub conn: ConnArgs,
}

fn parse_state(raw: &str) -> Result<JobState, String> {
    match raw {
        "running" => Ok(JobState::Running),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        other => Err(format!("unknown job state: {other}")),
    }
}

impl JobCli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            JobSubcommand::Submit(args) => cmd_submit(args).await,
            JobSubcommand::Status(args) => cmd_status(args).await,
            JobSubcommand::List(args) => cmd_list(args).await,
            JobSubcommand::Cancel(args) => cmd_cancel(args).await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// service
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
pub struct ServiceCli {
    #[command(subcommand)]
    pub command: ServiceSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ServiceSubcommand {
    /// Uptime and job counts.
    Status(ConnArgs),
}

impl ServiceCli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            ServiceSubcommand::Status(conn) => cmd_service_status(conn).await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command implementations
// ─────────────────────────────────────────────────────────────────────────────

async fn cmd_submit(args: SubmitArgs) -> anyhow::Result<()> {
    let mut client = args.conn.connect().await?;
    let mut job = client
        .submit(&SubmitParams {
            repo_url: args.repo_url,
            output_type: args.output_type,
            export: args.export,
        })
        .await?;

    if !args.wait {
        if args.conn.json {
            crate::print_json(&job);
        } else {
            println!(
                "Job submitted: {} ({}, {})",
                job.id, job.repo_name, job.output_type
            );
        }
        return Ok(());
    }

    while !job.status.is_terminal() {
        tokio::time::sleep(POLL_INTERVAL).await;
        job = client.get(&job.id).await?;
    }
    print_job(&job, args.conn.json);
    if job.status == JobState::Failed {
        bail!("job {} failed", job.id);
    }
    Ok(())
}

async fn cmd_status(args: JobIdArgs) -> anyhow::Result<()> {
    let mut client = args.conn.connect().await?;
    let job = client.get(&args.job_id).await?;
    print_job(&job, args.conn.json);
    Ok(())
}

async fn cmd_list(args: ListArgs) -> anyhow::Result<()> {
    let mut client = args.conn.connect().await?;
    let result = client
        .list(&ListParams {
            limit: Some(args.limit),
            status: args.status,
        })
        .await?;

    if args.conn.json {
        crate::print_json(&result);
    } else if result.jobs.is_empty() {
        println!("No jobs");
    } else {
        for job in &result.jobs {
            println!(
                "  {} {:<9} {:<8} {}",
                job.id,
                job.status.as_str(),
                job.output_type.as_str(),
                job.repo_url
            );
        }
        if result.total > result.jobs.len() {
            println!("  ... {} more", result.total - result.jobs.len());
        }
    }
    Ok(())
}

async fn cmd_cancel(args: JobIdArgs) -> anyhow::Result<()> {
    let mut client = args.conn.connect().await?;
    let result = client.cancel(&args.job_id).await?;

    if args.conn.json {
        crate::print_json(&result);
    } else if result.cancel_requested {
        println!("Cancellation requested for {}", result.job_id);
    } else {
        println!("Job {} already {}", result.job_id, result.status);
    }
    Ok(())
}

async fn cmd_service_status(conn: ConnArgs) -> anyhow::Result<()> {
    let mut client = conn.connect().await?;
    let status = client.status().await?;

    if conn.json {
        crate::print_json(&status);
    } else {
        println!(
            "Job service v{}: uptime {}s, {} running / {} total jobs, {} workers",
            client.service_info().service_version,
            status.uptime_s,
            status.running_jobs,
            status.total_jobs,
            status.max_concurrent_jobs,
        );
    }
    Ok(())
}

fn print_job(job: &JobRecord, json: bool) {
    if json {
        crate::print_json(job);
        return;
    }
    println!("{} ({}) {}", job.id, job.output_type, job.status);
    println!("  repository: {}", job.repo_url);
    if let Some(path) = &job.report_path {
        println!("  report:     {}", path.display());
    }
    if let Some(path) = &job.export_path {
        println!("  export:     {}", path.display());
    }
    if let Some(error) = &job.error {
        println!("  error:      {error}");
    }
}
