//! Job records held by the download queue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::control::AbortHandle;

/// Job identifier. Assigned from a monotonic counter at enqueue, never reused.
pub type JobId = u64;

/// Source platform for a job; selects the runner strategy and URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
    Coomer,
    Gofile,
    External,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Coomer => "coomer",
            Platform::Gofile => "gofile",
            Platform::External => "external",
        }
    }

    /// True if the subject alone is not enough to build a source URL.
    pub fn requires_url(self) -> bool {
        matches!(self, Platform::Gofile | Platform::External)
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "coomer" => Ok(Platform::Coomer),
            "gofile" => Ok(Platform::Gofile),
            "external" => Ok(Platform::External),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Transitions only through the queue/runner:
/// queued → active → {completed, failed}, with active → paused → queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Paused,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states stay until deleted or cleared.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Full job record owned by the queue store.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub subject: String,
    pub platform: Platform,
    pub url: Option<String>,
    pub folder: Option<String>,
    /// Resolved output directory; set at admission.
    pub dest: Option<PathBuf>,
    pub status: JobStatus,
    /// Latest human-readable progress line, overwritten on every update.
    pub message: String,
    pub files_completed: u64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// Stop token; present only while active.
    pub handle: Option<AbortHandle>,
}

impl Job {
    pub fn new(id: JobId, subject: String, platform: Platform, url: Option<String>, folder: Option<String>) -> Self {
        Self {
            id,
            subject,
            platform,
            url,
            folder,
            dest: None,
            status: JobStatus::Queued,
            message: "Waiting in queue...".to_string(),
            files_completed: 0,
            started_at: None,
            completed_at: None,
            handle: None,
        }
    }

    /// Source URL for the external fetch tool, built from the subject when no
    /// explicit URL was given.
    pub fn target_url(&self) -> String {
        if let Some(url) = &self.url {
            if self.platform == Platform::Coomer {
                // The coomer.su domain redirects poorly; rewrite to the live one.
                return url.replace("coomer.su", "coomer.st");
            }
            return url.clone();
        }
        match self.platform {
            Platform::Instagram => format!("https://www.instagram.com/{}/", self.subject),
            Platform::Tiktok => format!("https://www.tiktok.com/@{}", self.subject),
            Platform::Coomer => {
                // Subject is "service/username"; bare usernames default to onlyfans.
                let (service, username) = match self.subject.split_once('/') {
                    Some((service, username)) => (service, username),
                    None => ("onlyfans", self.subject.as_str()),
                };
                format!("https://coomer.st/{service}/user/{username}")
            }
            Platform::Gofile | Platform::External => String::new(),
        }
    }

    /// Subject as shown in notifications; coomer subjects drop the service prefix.
    pub fn display_name(&self) -> &str {
        if self.platform == Platform::Coomer {
            if let Some((_, username)) = self.subject.split_once('/') {
                return username;
            }
        }
        &self.subject
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            subject: self.subject.clone(),
            platform: self.platform,
            status: self.status,
            message: self.message.clone(),
            files_completed: self.files_completed,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only view returned by `list()`; serializable for the control socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub subject: String,
    pub platform: Platform,
    pub status: JobStatus,
    pub message: String,
    pub files_completed: u64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Current unix time in seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(platform: Platform, subject: &str, url: Option<&str>) -> Job {
        Job::new(1, subject.to_string(), platform, url.map(String::from), None)
    }

    #[test]
    fn instagram_profile_url() {
        let j = job(Platform::Instagram, "someuser", None);
        assert_eq!(j.target_url(), "https://www.instagram.com/someuser/");
    }

    #[test]
    fn tiktok_handle_url() {
        let j = job(Platform::Tiktok, "someuser", None);
        assert_eq!(j.target_url(), "https://www.tiktok.com/@someuser");
    }

    #[test]
    fn coomer_service_pair() {
        let j = job(Platform::Coomer, "fansly/creator", None);
        assert_eq!(j.target_url(), "https://coomer.st/fansly/user/creator");
        assert_eq!(j.display_name(), "creator");
    }

    #[test]
    fn coomer_bare_subject_defaults_to_onlyfans() {
        let j = job(Platform::Coomer, "creator", None);
        assert_eq!(j.target_url(), "https://coomer.st/onlyfans/user/creator");
        assert_eq!(j.display_name(), "creator");
    }

    #[test]
    fn coomer_explicit_url_domain_rewrite() {
        let j = job(
            Platform::Coomer,
            "creator",
            Some("https://coomer.su/onlyfans/user/creator"),
        );
        assert_eq!(j.target_url(), "https://coomer.st/onlyfans/user/creator");
    }

    #[test]
    fn explicit_url_wins() {
        let j = job(Platform::Instagram, "someuser", Some("https://example.com/x"));
        assert_eq!(j.target_url(), "https://example.com/x");
    }

    #[test]
    fn status_terminality() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn platform_parse() {
        assert_eq!("Instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("gofile".parse::<Platform>().unwrap(), Platform::Gofile);
        assert!("ftp".parse::<Platform>().is_err());
    }
}
