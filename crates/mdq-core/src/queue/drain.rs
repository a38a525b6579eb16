//! The drain task: admits queued jobs up to the concurrency cap.
//!
//! A single logical loop per queue, parked on the `Notify` while nothing is
//! queued. Admission (count active, mark the next queued job) happens
//! atomically under the store lock; the runner is dispatched after the lock
//! is released.

use std::sync::Arc;

use crate::job::JobStatus;
use crate::runner;

use super::{admit_next, QueueInner, DRAIN_POLL};

/// Park bound while the queue has nothing queued at all.
const IDLE_POLL: std::time::Duration = std::time::Duration::from_secs(2);

pub(crate) async fn drain_loop(inner: Arc<QueueInner>) {
    loop {
        while let Some(id) = admit_next(&inner) {
            tracing::debug!(id, "job admitted");
            tokio::spawn(runner::run_job(Arc::clone(&inner), id));
        }

        let has_queued = {
            let state = inner
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.jobs.iter().any(|j| j.status == JobStatus::Queued)
        };

        // Always bound the park with a poll: `notify_one` permits can be
        // consumed by other waiters (wait_idle), and a missed wakeup must
        // not strand a queued job.
        let park = if has_queued {
            DRAIN_POLL
        } else {
            IDLE_POLL
        };
        tokio::select! {
            _ = inner.drain.notified() => {}
            _ = tokio::time::sleep(park) => {}
        }
    }
}
