//! `reposcribe` command line.
//!
//! - `reposcribe analyze <REPO>` runs one job in-process and waits for it.
//! - `reposcribe job ...` and `reposcribe service status` talk to a
//!   running `reposcribe-jobd` over its socket.

pub mod analyze_cmd;
pub mod job_cmd;

use clap::{Parser, Subcommand};

use crate::analyze_cmd::AnalyzeArgs;
use crate::job_cmd::{JobCli, ServiceCli};

#[derive(Debug, Parser)]
#[command(name = "reposcribe", version, about = "Turn a source repository into a written report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a repository and write the report locally.
    Analyze(AnalyzeArgs),
    /// Jobs on a running job service.
    Job(JobCli),
    /// Job service health.
    Service(ServiceCli),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Analyze(args) => args.run().await,
            Command::Job(job) => job.run().await,
            Command::Service(service) => service.run().await,
        }
    }
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_cmd::JobSubcommand;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn analyze_flags() {
        let cli = Cli::try_parse_from([
            "reposcribe",
            "analyze",
            "https://github.com/acme/tool",
            "-t",
            "readme",
            "-o",
            "out",
            "--export",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.repo_url, "https://github.com/acme/tool");
        assert_eq!(args.output_type, "readme");
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.export);
        assert!(!args.json);
    }

    #[test]
    fn analyze_defaults_to_analysis() {
        let cli = Cli::try_parse_from(["reposcribe", "analyze", "repo"]).unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.output_type, "analysis");
        assert_eq!(args.output_dir, None);
    }

    #[test]
    fn job_submit_with_wait() {
        let cli = Cli::try_parse_from([
            "reposcribe",
            "job",
            "submit",
            "repo",
            "--output-type",
            "guidance",
            "--wait",
            "--socket",
            "/tmp/x.sock",
        ])
        .unwrap();
        let Command::Job(job) = cli.command else {
            panic!("expected job");
        };
        let JobSubcommand::Submit(args) = job.command else {
            panic!("expected submit");
        };
        assert_eq!(args.output_type.as_deref(), Some("guidance"));
        assert!(args.wait);
        assert_eq!(args.conn.socket, Some(PathBuf::from("/tmp/x.sock")));
    }

    #[test]
    fn analyze_requires_repository() {
        assert!(Cli::try_parse_from(["reposcribe", "analyze"]).is_err());
    }
}
