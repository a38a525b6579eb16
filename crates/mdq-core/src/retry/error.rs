//! Fetch error type for retry classification.

/// Error from one HTTP fetch (API call or file download attempt).
/// Typed so callers can classify and decide retries before converting to anyhow.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had an unexpected status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Server answered a ranged request without honoring the range.
    /// Retried: some mirrors intermittently drop Range support.
    #[error("range request answered with HTTP {0} instead of 206")]
    RangeNotHonored(u32),
    /// Transfer completed but the temp file does not match the expected size
    /// (e.g. server closed early). Enables retry instead of silent truncation.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Neither Content-Length nor Content-Range gave a total size. Not retried.
    #[error("could not determine total size")]
    SizeUnknown,
    /// Disk write failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// The remote API answered with a malformed or non-ok payload. Not retried.
    #[error("api: {0}")]
    Api(String),
    /// Stopped by user request (pause/delete). Not retried, not reported.
    #[error("aborted")]
    Aborted,
}
