//! `mdq fetch <url>` – one-shot gofile download without the queue.

use anyhow::Result;
use std::path::PathBuf;

use mdq_core::config::MdqConfig;
use mdq_core::control::AbortHandle;
use mdq_core::gofile::{is_gofile_url, GofileDownloader};
use mdq_core::retry::RetryPolicy;

pub async fn run_fetch(
    cfg: &MdqConfig,
    url: &str,
    password: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(is_gofile_url(url), "not a gofile content URL: {url}");
    let output = match output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let abort = AbortHandle::new();
    let ctrl_abort = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping...");
            ctrl_abort.request_stop();
        }
    });

    let progress = Box::new(|line: &str, files: u64, total: u64| {
        if total > 0 {
            println!("[{files}/{total}] {line}");
        } else {
            println!("{line}");
        }
    });
    let downloader = GofileDownloader::new(
        url.to_string(),
        output,
        password,
        cfg.gofile(),
        RetryPolicy::from_config(cfg.retry.as_ref()),
        abort,
        progress,
    );

    let outcome = tokio::task::spawn_blocking(move || downloader.run()).await?;
    for error in &outcome.errors {
        eprintln!("error: {error}");
    }
    println!("{}", outcome.message);
    anyhow::ensure!(outcome.success, "download failed");
    Ok(())
}
