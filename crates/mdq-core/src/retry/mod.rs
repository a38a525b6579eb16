//! Retry and backoff policy.
//!
//! Encapsulates error classification (timeouts, throttling, connection
//! failures) and exponential backoff decisions so the gofile API client and
//! the per-file fetcher share a consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

use crate::config::RetryConfig;

impl RetryPolicy {
    /// Builds a policy from the optional config section, falling back to defaults.
    pub fn from_config(cfg: Option<&RetryConfig>) -> Self {
        match cfg {
            Some(c) => Self {
                max_attempts: c.max_attempts.max(1),
                base_delay: std::time::Duration::from_secs_f64(c.base_delay_secs.max(0.0)),
                max_delay: std::time::Duration::from_secs(c.max_delay_secs),
            },
            None => Self::default(),
        }
    }
}
