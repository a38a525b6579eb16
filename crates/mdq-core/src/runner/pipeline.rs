//! In-process pipeline strategy: the gofile resolver + fetcher.
//!
//! Runs the blocking downloader on `spawn_blocking`, streams its progress
//! into the job record, and maps the aggregate outcome onto the job state
//! machine. Zero files with zero errors is a successful "nothing to do",
//! not a failure.

use std::sync::Arc;

use crate::control::AbortHandle;
use crate::gofile::GofileDownloader;
use crate::job::Job;
use crate::queue::{update_job, QueueInner};
use crate::retry::RetryPolicy;

use super::output;
use super::RunOutcome;

pub(crate) async fn run(inner: &Arc<QueueInner>, job: &Job, abort: &AbortHandle) -> RunOutcome {
    let Some(dest) = job.dest.clone() else {
        return RunOutcome::Failed {
            message: "No destination resolved for job".to_string(),
        };
    };
    if let Err(e) = tokio::fs::create_dir_all(&dest).await {
        return RunOutcome::Failed {
            message: format!("Cannot create {}: {e}", dest.display()),
        };
    }
    let Some(url) = job.url.clone() else {
        return RunOutcome::Failed {
            message: "No source URL for job".to_string(),
        };
    };

    let progress_inner = Arc::clone(inner);
    let id = job.id;
    let progress = Box::new(move |line: &str, files: u64, _total: u64| {
        update_job(&progress_inner, id, |j| {
            j.message = output::clamp(line, output::MESSAGE_MAX);
            j.files_completed = files;
        });
    });

    let downloader = GofileDownloader::new(
        url,
        dest,
        None,
        inner.config.gofile(),
        RetryPolicy::from_config(inner.config.retry.as_ref()),
        abort.clone(),
        progress,
    );

    let outcome = match tokio::task::spawn_blocking(move || downloader.run()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return RunOutcome::Failed {
                message: format!("gofile worker failed: {e}"),
            }
        }
    };

    if outcome.aborted {
        return RunOutcome::Stopped;
    }
    for error in &outcome.errors {
        tracing::warn!(id, "gofile: {error}");
    }

    if outcome.success {
        let message = if outcome.errors.is_empty() && outcome.total_files > 0 {
            format!("Completed! Downloaded {} files", outcome.files_completed)
        } else {
            // "No files found in content" or the partial N/M summary.
            outcome.message
        };
        RunOutcome::Completed {
            files: outcome.files_completed,
            message,
        }
    } else {
        RunOutcome::Failed {
            message: outcome.message,
        }
    }
}
