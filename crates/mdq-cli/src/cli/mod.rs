//! CLI for the MDQ download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdq_core::config;
use mdq_core::job::Platform;
use std::path::PathBuf;

use commands::{
    run_add, run_clear, run_fetch, run_pause, run_queue, run_remove, run_resume, run_status,
};

/// Top-level CLI for the MDQ download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: bounded-concurrency media download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the queue: enqueue targets, process them, serve the control socket.
    Run {
        /// Subjects or URLs. http(s) links are auto-detected (gofile links
        /// run the in-process pipeline, everything else the external tool).
        targets: Vec<String>,

        /// Platform for non-URL targets (instagram, tiktok, coomer).
        #[arg(long, short = 'p')]
        platform: Option<Platform>,

        /// Destination folder override, relative to the download root.
        #[arg(long)]
        folder: Option<String>,

        /// Max concurrent jobs (overrides config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Download root (overrides config; default is the current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Download a gofile link directly, without the queue.
    Fetch {
        /// Gofile content URL (https://gofile.io/d/...).
        url: String,

        /// Password for protected content.
        #[arg(long)]
        password: Option<String>,

        /// Output directory (default: current directory).
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Show the live queue (requires a running `mdq run`).
    Status,

    /// Pause an active job by its ID.
    Pause {
        /// Job identifier.
        id: u64,
    },

    /// Resume a paused job by its ID.
    Resume {
        /// Job identifier.
        id: u64,
    },

    /// Remove a job by its ID; an active job is stopped first.
    Remove {
        /// Job identifier.
        id: u64,
    },

    /// Remove all completed and failed jobs.
    Clear,

    /// Enqueue a job on the running queue.
    Add {
        /// Username, service/username pair, or URL.
        subject: String,

        /// Platform of the subject.
        #[arg(long, short = 'p', default_value = "instagram")]
        platform: Platform,

        /// Explicit source URL (required for gofile/external).
        #[arg(long)]
        url: Option<String>,

        /// Destination folder override.
        #[arg(long)]
        folder: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                targets,
                platform,
                folder,
                jobs,
                dir,
            } => run_queue(&cfg, targets, platform, folder, jobs, dir).await?,
            CliCommand::Fetch {
                url,
                password,
                output,
            } => run_fetch(&cfg, &url, password, output).await?,
            CliCommand::Status => run_status().await?,
            CliCommand::Pause { id } => run_pause(id).await?,
            CliCommand::Resume { id } => run_resume(id).await?,
            CliCommand::Remove { id } => run_remove(id).await?,
            CliCommand::Clear => run_clear().await?,
            CliCommand::Add {
                subject,
                platform,
                url,
                folder,
            } => run_add(&subject, platform, url, folder).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_targets_and_platform() {
        let cli = Cli::try_parse_from(["mdq", "run", "someuser", "-p", "tiktok", "--jobs", "3"])
            .unwrap();
        match cli.command {
            CliCommand::Run {
                targets,
                platform,
                jobs,
                ..
            } => {
                assert_eq!(targets, vec!["someuser"]);
                assert_eq!(platform, Some(Platform::Tiktok));
                assert_eq!(jobs, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_fetch_with_password() {
        let cli = Cli::try_parse_from([
            "mdq",
            "fetch",
            "https://gofile.io/d/AbCd12",
            "--password",
            "hunter2",
        ])
        .unwrap();
        match cli.command {
            CliCommand::Fetch { url, password, .. } => {
                assert_eq!(url, "https://gofile.io/d/AbCd12");
                assert_eq!(password.as_deref(), Some("hunter2"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_platform() {
        assert!(Cli::try_parse_from(["mdq", "add", "x", "-p", "myspace"]).is_err());
    }
}
