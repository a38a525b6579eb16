use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Tuning for the gofile resolver/fetcher pipeline (optional section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GofileConfig {
    /// Concurrent per-file download workers (independent of the queue cap).
    pub max_workers: usize,
    /// Attempts per file and per metadata fetch (including the first).
    pub max_attempts: u32,
    /// Connect/request timeout in seconds for API calls.
    pub timeout_secs: u64,
}

impl Default for GofileConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_attempts: 5,
            timeout_secs: 15,
        }
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Maximum number of jobs running at once (hard admission cap).
    pub max_concurrent_downloads: usize,
    /// Kill an external fetch process after this many seconds without output.
    pub stall_timeout_secs: u64,
    /// External fetch command; whitespace-split into argv (e.g. "gallery-dl").
    pub fetch_command: String,
    /// Root directory for downloads. None = current directory at run time.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Cookie file passed to the external tool for instagram jobs.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional gofile pipeline tuning; if missing, built-in defaults are used.
    #[serde(default)]
    pub gofile: Option<GofileConfig>,
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 2,
            stall_timeout_secs: 600,
            fetch_command: "gallery-dl".to_string(),
            download_dir: None,
            cookie_file: None,
            retry: None,
            gofile: None,
        }
    }
}

impl MdqConfig {
    pub fn gofile(&self) -> GofileConfig {
        self.gofile.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdqConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = MdqConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 2);
        assert_eq!(cfg.stall_timeout_secs, 600);
        assert_eq!(cfg.fetch_command, "gallery-dl");
        assert!(cfg.download_dir.is_none());
        assert!(cfg.cookie_file.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MdqConfig = toml::from_str(&toml).unwrap();
        assert_eq!(
            parsed.max_concurrent_downloads,
            cfg.max_concurrent_downloads
        );
        assert_eq!(parsed.stall_timeout_secs, cfg.stall_timeout_secs);
        assert_eq!(parsed.fetch_command, cfg.fetch_command);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_downloads = 4
            stall_timeout_secs = 120
            fetch_command = "/usr/local/bin/gallery-dl --quiet"
            cookie_file = "/data/cookies/insta.txt"
        "#;
        let cfg: MdqConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 4);
        assert_eq!(cfg.stall_timeout_secs, 120);
        assert_eq!(cfg.fetch_command, "/usr/local/bin/gallery-dl --quiet");
        assert_eq!(
            cfg.cookie_file.as_deref(),
            Some(std::path::Path::new("/data/cookies/insta.txt"))
        );
        assert!(cfg.retry.is_none());
        assert!(cfg.gofile.is_none());
    }

    #[test]
    fn config_toml_retry_and_gofile_sections() {
        let toml = r#"
            max_concurrent_downloads = 1
            stall_timeout_secs = 60
            fetch_command = "gallery-dl"

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15

            [gofile]
            max_workers = 2
            max_attempts = 4
            timeout_secs = 10
        "#;
        let cfg: MdqConfig = toml::from_str(toml).unwrap();
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 15);
        let gofile = cfg.gofile();
        assert_eq!(gofile.max_workers, 2);
        assert_eq!(gofile.max_attempts, 4);
        assert_eq!(gofile.timeout_secs, 10);
    }
}
