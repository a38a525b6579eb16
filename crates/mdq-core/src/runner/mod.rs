//! Per-job execution.
//!
//! `run_job` owns one active job from dispatch to its exit: it selects the
//! strategy by platform, applies exactly one terminal transition (or a
//! non-terminal pause exit), clears the stop token on every path, and fires
//! the completion hooks after the store lock is released.

mod external;
pub mod output;
mod pipeline;

use std::sync::Arc;

use crate::control::AbortHandle;
use crate::job::{now_unix, Job, JobId, JobStatus, Platform};
use crate::queue::QueueInner;

pub(crate) enum RunOutcome {
    Completed { files: u64, message: String },
    Failed { message: String },
    /// Pause or delete stopped the run; no terminal transition.
    Stopped,
}

pub(crate) async fn run_job(inner: Arc<QueueInner>, id: JobId) {
    let Some((job, abort)) = snapshot_active(&inner, id) else {
        // Deleted between admission and dispatch.
        inner.drain.notify_one();
        return;
    };

    let outcome = match job.platform {
        Platform::Gofile => pipeline::run(&inner, &job, &abort).await,
        _ => external::run(&inner, &job, &abort).await,
    };

    finish(&inner, &job, outcome);
    // The slot is free either way; wake the drain task.
    inner.drain.notify_one();
}

fn snapshot_active(inner: &QueueInner, id: JobId) -> Option<(Job, AbortHandle)> {
    let state = inner
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let job = state.jobs.iter().find(|j| j.id == id)?;
    let abort = job.handle.clone()?;
    Some((job.clone(), abort))
}

/// Writes the exit state under the lock, then fires hooks outside it.
/// A job deleted mid-run is left alone (and not notified).
fn finish(inner: &QueueInner, job: &Job, outcome: RunOutcome) {
    let notification = {
        let mut state = inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(stored) = state.jobs.iter_mut().find(|j| j.id == job.id) else {
            tracing::debug!(id = job.id, "job deleted mid-run, discarding result");
            return;
        };
        stored.handle = None;
        match outcome {
            RunOutcome::Stopped => {
                if stored.status == JobStatus::Paused {
                    stored.message = "Download paused".to_string();
                }
                tracing::info!(id = job.id, "job stopped");
                None
            }
            RunOutcome::Completed { files, message } => {
                stored.status = JobStatus::Completed;
                stored.files_completed = files;
                stored.message = message;
                stored.completed_at = Some(now_unix());
                tracing::info!(id = job.id, files, "job completed");
                Some((notification_text(job, files, None), true))
            }
            RunOutcome::Failed { message } => {
                stored.status = JobStatus::Failed;
                stored.completed_at = Some(now_unix());
                tracing::warn!(id = job.id, %message, "job failed");
                let text = notification_text(job, 0, Some(&message));
                stored.message = message;
                Some((text, false))
            }
        }
    };

    if let Some((text, completed)) = notification {
        inner.hooks.notify(&text);
        if completed {
            inner.hooks.on_job_completed(&job.subject, job.platform);
        }
    }
}

fn notification_text(job: &Job, files: u64, failure: Option<&str>) -> String {
    let name = job.display_name();
    match failure {
        Some(reason) => format!("{name}: {reason}"),
        None if files > 0 => format!("{name}: downloaded {files} new files"),
        None => format!("{name}: up to date (no new content)"),
    }
}
