//! `mdq run` – enqueue targets, process the queue, serve the control socket.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mdq_core::config::MdqConfig;
use mdq_core::gofile::{is_gofile_url, parse_content_id};
use mdq_core::job::{JobStatus, Platform};
use mdq_core::notify::QueueHooks;
use mdq_core::queue::DownloadQueue;

use super::super::control_socket::{default_control_socket_path, spawn_control_listener};

/// Hooks for interactive runs: notifications go to stdout and the log.
struct PrintHooks;

impl QueueHooks for PrintHooks {
    fn notify(&self, text: &str) {
        println!("{text}");
    }

    fn on_job_completed(&self, subject: &str, platform: Platform) {
        tracing::info!(subject, %platform, "sync completed");
    }
}

pub async fn run_queue(
    cfg: &MdqConfig,
    targets: Vec<String>,
    platform: Option<Platform>,
    folder: Option<String>,
    jobs: Option<usize>,
    dir: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(!targets.is_empty(), "no targets given");

    let mut config = cfg.clone();
    if let Some(dir) = dir {
        config.download_dir = Some(dir);
    }
    if config.download_dir.is_none() {
        config.download_dir = Some(std::env::current_dir()?);
    }
    if let Some(jobs) = jobs {
        config.max_concurrent_downloads = jobs.max(1);
    }

    let queue = DownloadQueue::new(config, Arc::new(PrintHooks));
    for target in &targets {
        let (subject, platform, url) = parse_target(target, platform)?;
        let id = queue.enqueue(&subject, platform, url, folder.clone())?;
        println!("Queued job {id}: {target}");
    }

    let socket_path = default_control_socket_path()?;
    let listener = spawn_control_listener(queue.clone(), &socket_path)?;
    tracing::info!(path = %socket_path.display(), "control socket ready");

    // Echo each job's latest message whenever it changes.
    let printer_queue = queue.clone();
    let printer = tokio::spawn(async move {
        let mut last: HashMap<u64, String> = HashMap::new();
        loop {
            for job in printer_queue.list() {
                let line = format!(
                    "[{}] {} {}: {}",
                    job.id,
                    job.status.as_str(),
                    job.subject,
                    job.message
                );
                if last.get(&job.id) != Some(&line) {
                    println!("{line}");
                    last.insert(job.id, line);
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    });

    queue.wait_idle().await;
    printer.abort();
    listener.abort();
    let _ = std::fs::remove_file(&socket_path);

    let jobs = queue.list();
    let count = |s: JobStatus| jobs.iter().filter(|j| j.status == s).count();
    println!(
        "Finished: {} completed, {} failed, {} paused",
        count(JobStatus::Completed),
        count(JobStatus::Failed),
        count(JobStatus::Paused)
    );
    Ok(())
}

/// Maps a CLI target onto (subject, platform, url). URLs are auto-detected;
/// bare subjects need an explicit platform.
fn parse_target(
    target: &str,
    platform: Option<Platform>,
) -> Result<(String, Platform, Option<String>)> {
    if target.starts_with("http://") || target.starts_with("https://") {
        if is_gofile_url(target) {
            let subject = parse_content_id(target).unwrap_or_else(|| "gofile".to_string());
            return Ok((subject, Platform::Gofile, Some(target.to_string())));
        }
        return Ok((
            "external".to_string(),
            Platform::External,
            Some(target.to_string()),
        ));
    }
    let platform = platform.context("--platform is required for non-URL targets")?;
    anyhow::ensure!(
        !platform.requires_url(),
        "platform {platform} needs a URL target"
    );
    Ok((target.to_string(), platform, None))
}
