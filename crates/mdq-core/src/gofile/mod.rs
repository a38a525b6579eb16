//! Gofile.io pipeline: resolve a content tree, then download every file
//! through the bounded worker pool.
//!
//! Blocking throughout (curl); the runner drives it on `spawn_blocking`.

mod api;
mod fetch;
mod pool;
mod tree;

pub use api::{ApiClient, ContentNode};
pub use fetch::{fetch_unit, format_rate, part_path, FetchContext, Fetched};
pub use pool::{run_pool, PoolOutcome};
pub use tree::{resolve_tree, ContentSource, FetchUnit, ResolvedTree};

use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::GofileConfig;
use crate::control::AbortHandle;
use crate::retry::RetryPolicy;

/// Progress sink: (message, files_completed, total_files).
pub type ProgressFn = dyn Fn(&str, u64, u64) + Send + Sync;

/// Final result of one pipeline run.
#[derive(Debug)]
pub struct GofileOutcome {
    /// True when anything was downloaded, or nothing needed doing.
    pub success: bool,
    pub files_completed: u64,
    pub total_files: u64,
    pub errors: Vec<String>,
    pub message: String,
    /// True when the run was cut short by the stop token.
    pub aborted: bool,
}

impl GofileOutcome {
    fn failure(message: String, errors: Vec<String>, aborted: bool) -> Self {
        Self {
            success: false,
            files_completed: 0,
            total_files: 0,
            errors,
            message,
            aborted,
        }
    }
}

pub struct GofileDownloader {
    url: String,
    output_dir: PathBuf,
    password: Option<String>,
    options: GofileConfig,
    retry: RetryPolicy,
    abort: AbortHandle,
    progress: Box<ProgressFn>,
}

impl GofileDownloader {
    pub fn new(
        url: String,
        output_dir: PathBuf,
        password: Option<String>,
        options: GofileConfig,
        retry: RetryPolicy,
        abort: AbortHandle,
        progress: Box<ProgressFn>,
    ) -> Self {
        Self {
            url,
            output_dir,
            password,
            options,
            retry,
            abort,
            progress,
        }
    }

    /// Runs resolve + download to completion. Blocking.
    pub fn run(&self) -> GofileOutcome {
        (self.progress)("Initializing gofile download...", 0, 0);

        let Some(content_id) = parse_content_id(&self.url) else {
            return GofileOutcome::failure(
                "Invalid gofile URL - could not extract content ID".to_string(),
                vec![format!("not a gofile content URL: {}", self.url)],
                false,
            );
        };

        (self.progress)("Setting up gofile account...", 0, 0);
        let timeout = Duration::from_secs(self.options.timeout_secs.max(1));
        let mut client = ApiClient::new(timeout, self.retry);
        if let Err(e) = client.login_guest() {
            return GofileOutcome::failure(
                "Authentication failed".to_string(),
                vec![format!("account creation failed: {e}")],
                false,
            );
        }

        let password_hash = self.password.as_deref().map(|p| {
            let mut hasher = Sha256::new();
            hasher.update(p.as_bytes());
            hex::encode(hasher.finalize())
        });

        let content_dir = self.output_dir.join(&content_id);
        if let Err(e) = fs::create_dir_all(&content_dir) {
            return GofileOutcome::failure(
                format!("Cannot create {}", content_dir.display()),
                vec![e.to_string()],
                false,
            );
        }

        (self.progress)("Fetching content structure...", 0, 0);
        let tree = resolve_tree(
            &client,
            &content_dir,
            &content_id,
            password_hash.as_deref(),
            &self.abort,
        );

        if tree.units.is_empty() {
            remove_if_empty(&content_dir);
            let aborted = self.abort.is_stopped();
            if tree.errors.is_empty() {
                return GofileOutcome {
                    success: true,
                    files_completed: 0,
                    total_files: 0,
                    errors: Vec::new(),
                    message: "No files found in content".to_string(),
                    aborted,
                };
            }
            let message = tree.errors.last().cloned().unwrap_or_default();
            return GofileOutcome::failure(message, tree.errors, aborted);
        }

        let total_files = tree.units.len() as u64;
        (self.progress)(
            &format!("Found {total_files} files, starting download..."),
            0,
            total_files,
        );

        let files_done = AtomicU64::new(0);
        let line_progress = |line: &str| {
            (self.progress)(line, files_done.load(Ordering::Relaxed), total_files);
        };
        let policy = self.retry;
        let fetched = run_pool(
            tree.units,
            self.options.max_workers,
            &self.abort,
            |unit| {
                let res = fetch_unit(
                    unit,
                    &FetchContext {
                        policy: &policy,
                        connect_timeout: timeout,
                        abort: &self.abort,
                        progress: &line_progress,
                    },
                );
                if res.is_ok() {
                    files_done.fetch_add(1, Ordering::Relaxed);
                }
                res
            },
        );

        let mut errors = tree.errors;
        errors.extend(fetched.errors);
        let files_completed = fetched.files_completed;
        let success = files_completed > 0 || errors.is_empty();
        let message = if errors.is_empty() {
            format!("Downloaded {files_completed}/{total_files} files")
        } else {
            format!(
                "Downloaded {files_completed}/{total_files} files ({} failed)",
                errors.len()
            )
        };

        GofileOutcome {
            success,
            files_completed,
            total_files,
            errors,
            message,
            aborted: self.abort.is_stopped(),
        }
    }
}

/// Best-effort removal of a content dir that ended up with nothing in it.
fn remove_if_empty(dir: &std::path::Path) {
    if let Ok(mut entries) = fs::read_dir(dir) {
        if entries.next().is_none() {
            let _ = fs::remove_dir(dir);
        }
    }
}

/// True for links of the form `https://gofile.io/d/<id>`.
pub fn is_gofile_url(url: &str) -> bool {
    url.to_lowercase().contains("gofile.io/d/")
}

/// Extracts the content id from a gofile share link.
pub fn parse_content_id(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "d" {
            return segments
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gofile_links() {
        assert!(is_gofile_url("https://gofile.io/d/AbCd12"));
        assert!(is_gofile_url("HTTPS://GOFILE.IO/D/AbCd12"));
        assert!(!is_gofile_url("https://example.com/d/AbCd12"));
    }

    #[test]
    fn extracts_content_id() {
        assert_eq!(
            parse_content_id("https://gofile.io/d/AbCd12").as_deref(),
            Some("AbCd12")
        );
        assert_eq!(
            parse_content_id("https://gofile.io/d/AbCd12/").as_deref(),
            Some("AbCd12")
        );
        assert_eq!(parse_content_id("https://gofile.io/d/"), None);
        assert_eq!(parse_content_id("https://gofile.io/welcome"), None);
        assert_eq!(parse_content_id("not a url"), None);
    }
}
