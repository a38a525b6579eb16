//! The download queue: job store, admission, and the public operations.
//!
//! One `QueueState` behind a mutex is the only shared mutable state. All
//! mutations go through these methods; runners update their own job through
//! [`update_job`], which takes the same lock for short, field-level writes so
//! readers always see consistent snapshots.

mod drain;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::config::MdqConfig;
use crate::gofile::is_gofile_url;
use crate::job::{now_unix, Job, JobId, JobSnapshot, JobStatus, Platform};
use crate::notify::QueueHooks;

/// Sleep between admission rechecks while jobs are queued but no slot is free.
const DRAIN_POLL: std::time::Duration = std::time::Duration::from_millis(500);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("job {0} is not active")]
    NotActive(JobId),
    #[error("job {0} is not paused")]
    NotPaused(JobId),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

pub(crate) struct QueueState {
    pub(crate) jobs: Vec<Job>,
    next_id: JobId,
}

pub(crate) struct QueueInner {
    pub(crate) state: Mutex<QueueState>,
    /// Pinged on enqueue/resume and whenever a slot frees up. The single
    /// drain task parks here, so trigger storms collapse into one pass.
    pub(crate) drain: Notify,
    pub(crate) max_concurrent: AtomicUsize,
    pub(crate) config: MdqConfig,
    pub(crate) download_root: PathBuf,
    pub(crate) hooks: Arc<dyn QueueHooks>,
}

/// Bounded-concurrency job queue. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<QueueInner>,
}

impl DownloadQueue {
    /// Creates the queue and spawns its drain task. Must be called from
    /// within a tokio runtime.
    pub fn new(config: MdqConfig, hooks: Arc<dyn QueueHooks>) -> Self {
        let download_root = config
            .download_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let inner = Arc::new(QueueInner {
            state: Mutex::new(QueueState {
                jobs: Vec::new(),
                next_id: 0,
            }),
            drain: Notify::new(),
            max_concurrent: AtomicUsize::new(config.max_concurrent_downloads.max(1)),
            config,
            download_root,
            hooks,
        });
        tokio::spawn(drain::drain_loop(Arc::clone(&inner)));
        Self { inner }
    }

    /// Appends a new queued job and triggers draining. Non-blocking.
    pub fn enqueue(
        &self,
        subject: &str,
        platform: Platform,
        url: Option<String>,
        folder: Option<String>,
    ) -> Result<JobId, QueueError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(QueueError::InvalidTarget("empty subject".to_string()));
        }
        match (&url, platform.requires_url()) {
            (None, true) => {
                return Err(QueueError::InvalidTarget(format!(
                    "platform {platform} requires a URL"
                )))
            }
            (Some(u), _) if !u.starts_with("http://") && !u.starts_with("https://") => {
                return Err(QueueError::InvalidTarget(format!("not an http(s) URL: {u}")));
            }
            _ => {}
        }
        if platform == Platform::Gofile {
            let u = url.as_deref().unwrap_or("");
            if !is_gofile_url(u) {
                return Err(QueueError::InvalidTarget(format!(
                    "not a gofile content URL: {u}"
                )));
            }
        }

        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = state.next_id;
            state
                .jobs
                .push(Job::new(id, subject.to_string(), platform, url, folder));
            id
        };
        tracing::info!(id, %platform, subject, "job enqueued");
        self.inner.drain.notify_one();
        Ok(id)
    }

    /// Snapshots of all jobs in insertion order.
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.lock().jobs.iter().map(Job::snapshot).collect()
    }

    /// Pauses an active job: flips its status and triggers its stop token.
    /// The runner notices, terminates the live fetch, and exits without a
    /// terminal transition.
    pub fn pause(&self, id: JobId) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            let job = find(&mut state, id)?;
            if job.status != JobStatus::Active {
                return Err(QueueError::NotActive(id));
            }
            job.status = JobStatus::Paused;
            job.message = "Pausing...".to_string();
            if let Some(handle) = &job.handle {
                handle.request_stop();
            }
        }
        tracing::info!(id, "job paused");
        // The paused job frees a slot once its runner exits.
        self.inner.drain.notify_one();
        Ok(())
    }

    /// Re-queues a paused job. It keeps its original position in the store,
    /// so it re-admits by original enqueue order. The file counter restarts
    /// with the new run.
    pub fn resume(&self, id: JobId) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            let job = find(&mut state, id)?;
            if job.status != JobStatus::Paused {
                return Err(QueueError::NotPaused(id));
            }
            job.status = JobStatus::Queued;
            job.message = "Resuming...".to_string();
            job.files_completed = 0;
        }
        tracing::info!(id, "job resumed");
        self.inner.drain.notify_one();
        Ok(())
    }

    /// Removes a job in any state; an active job's fetch is stopped first.
    pub fn delete(&self, id: JobId) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            let idx = state
                .jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or(QueueError::NotFound(id))?;
            if let Some(handle) = &state.jobs[idx].handle {
                handle.request_stop();
            }
            state.jobs.remove(idx);
        }
        tracing::info!(id, "job deleted");
        self.inner.drain.notify_one();
        Ok(())
    }

    /// Drops all completed/failed jobs; everything else is untouched.
    pub fn clear_finished(&self) {
        let mut state = self.lock();
        state.jobs.retain(|j| !j.status.is_terminal());
    }

    /// Adjusts the admission cap at runtime. Takes effect for future
    /// admissions; already-active jobs are not preempted.
    pub fn set_max_concurrent(&self, n: usize) {
        self.inner.max_concurrent.store(n.max(1), Ordering::Relaxed);
        self.inner.drain.notify_one();
    }

    /// Resolves once no job is queued or active (paused and terminal jobs
    /// may remain).
    pub async fn wait_idle(&self) {
        loop {
            {
                let state = self.lock();
                let busy = state
                    .jobs
                    .iter()
                    .any(|j| matches!(j.status, JobStatus::Queued | JobStatus::Active));
                if !busy {
                    return;
                }
            }
            tokio::select! {
                _ = self.inner.drain.notified() => {}
                _ = tokio::time::sleep(DRAIN_POLL) => {}
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn find(state: &mut QueueState, id: JobId) -> Result<&mut Job, QueueError> {
    state
        .jobs
        .iter_mut()
        .find(|j| j.id == id)
        .ok_or(QueueError::NotFound(id))
}

/// Applies `f` to the job under the store lock. No-op when the job has been
/// deleted mid-run.
pub(crate) fn update_job<F>(inner: &QueueInner, id: JobId, f: F)
where
    F: FnOnce(&mut Job),
{
    let mut state = inner
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
        f(job);
    }
}

/// Atomic count-and-mark admission step: if a slot is free, the earliest
/// queued job becomes active with `started_at`, destination, and a fresh
/// stop token set. Returns its id for dispatch outside the lock.
pub(crate) fn admit_next(inner: &QueueInner) -> Option<JobId> {
    let cap = inner.max_concurrent.load(Ordering::Relaxed).max(1);
    let mut state = inner
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let active = state
        .jobs
        .iter()
        .filter(|j| j.status == JobStatus::Active)
        .count();
    if active >= cap {
        return None;
    }
    let root = inner.download_root.clone();
    let job = state.jobs.iter_mut().find(|j| j.status == JobStatus::Queued)?;
    job.status = JobStatus::Active;
    job.started_at = Some(now_unix());
    job.message = "Starting download...".to_string();
    job.dest = Some(crate::dest::resolve_dest(&root, job));
    job.handle = Some(crate::control::AbortHandle::new());
    Some(job.id)
}
