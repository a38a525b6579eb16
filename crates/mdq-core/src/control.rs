//! Stop tokens for pause/delete/timeout.
//!
//! Every active job owns an `AbortHandle` stored in its record. The runner
//! executing the job polls it between output lines / chunks; the queue
//! triggers it (read-only access) when pause or delete is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error returned when a fetch is stopped by user request (pause/delete).
#[derive(Debug)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// Shared stop token. Cloned into the runner when a job is admitted; the
/// clone left in the job record is used to request a stop.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    stop: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running fetch stop. The runner sees the flag at its
    /// next poll point and terminates the live process or transfer.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_visible_across_clones() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_stopped());
        handle.request_stop();
        assert!(clone.is_stopped());
    }
}
