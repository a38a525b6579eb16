//! External-process strategy: spawn the fetch tool and supervise it.
//!
//! The tool's combined stdout/stderr is read line by line; lines drive the
//! job's progress fields. No output for the stall window means the tool is
//! hung and gets killed. The stop token is polled between reads so pause
//! and delete take effect within a tick even while the tool is silent.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::MdqConfig;
use crate::control::AbortHandle;
use crate::job::{Job, Platform};
use crate::queue::{update_job, QueueInner};

use super::output;
use super::RunOutcome;

/// How often the supervisor wakes to poll the stop token while no output
/// arrives.
const ABORT_TICK: Duration = Duration::from_secs(1);

pub(crate) async fn run(inner: &Arc<QueueInner>, job: &Job, abort: &AbortHandle) -> RunOutcome {
    let Some(dest) = job.dest.clone() else {
        return RunOutcome::Failed {
            message: "No destination resolved for job".to_string(),
        };
    };
    if let Err(e) = tokio::fs::create_dir_all(&dest).await {
        return RunOutcome::Failed {
            message: format!("Cannot create {}: {e}", dest.display()),
        };
    }
    let url = job.target_url();
    if url.is_empty() {
        return RunOutcome::Failed {
            message: "No source URL for job".to_string(),
        };
    }

    let argv = build_argv(&inner.config, &inner.download_root, job, &dest, &url);
    let Some((program, args)) = argv.split_first() else {
        return RunOutcome::Failed {
            message: "fetch_command is not configured".to_string(),
        };
    };

    update_job(inner, job.id, |j| {
        j.message = format!("Running {program}...");
    });

    let mut child = match Command::new(program)
        .args(args)
        .current_dir(&inner.download_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return RunOutcome::Failed {
                message: format!("Failed to start {program}: {e}"),
            }
        }
    };

    let (tx, mut rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, tx.clone());
    }
    drop(tx);

    let stall = Duration::from_secs(inner.config.stall_timeout_secs.max(1));
    let mut files = 0u64;
    let mut last_output = Instant::now();

    loop {
        if abort.is_stopped() {
            terminate(&mut child).await;
            return RunOutcome::Stopped;
        }
        match tokio::time::timeout(ABORT_TICK, rx.recv()).await {
            Ok(Some(line)) => {
                last_output = Instant::now();
                update_job(inner, job.id, |j| {
                    if output::apply_line(j, &line) {
                        files = j.files_completed;
                    }
                });
            }
            // Both streams closed: the process is exiting.
            Ok(None) => break,
            Err(_) => {
                if last_output.elapsed() >= stall {
                    terminate(&mut child).await;
                    return RunOutcome::Failed {
                        message: format!(
                            "Timeout after {} seconds of inactivity",
                            stall.as_secs()
                        ),
                    };
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => RunOutcome::Completed {
            files,
            message: format!("Completed! Downloaded {files} files"),
        },
        Ok(status) => RunOutcome::Failed {
            message: match status.code() {
                Some(code) => format!("Failed with exit code {code}"),
                None => "Terminated by signal".to_string(),
            },
        },
        Err(e) => RunOutcome::Failed {
            message: format!("Failed to wait for {program}: {e}"),
        },
    }
}

fn spawn_line_reader<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

/// SIGKILL, then reap. Hung tools do not get a polite shutdown.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("kill: {e}");
    }
    let _ = child.wait().await;
}

/// Argv for the fetch tool: configured command prefix, dedup archive inside
/// the destination, the download root, platform-specific options, the
/// target URL, and verbose output for line parsing.
pub(crate) fn build_argv(
    cfg: &MdqConfig,
    download_root: &Path,
    job: &Job,
    dest: &Path,
    url: &str,
) -> Vec<String> {
    let mut argv: Vec<String> = cfg
        .fetch_command
        .split_whitespace()
        .map(String::from)
        .collect();
    if argv.is_empty() {
        return argv;
    }

    argv.push("--download-archive".to_string());
    argv.push(dest.join(".archive.txt").to_string_lossy().into_owned());
    argv.push("-d".to_string());
    argv.push(download_root.to_string_lossy().into_owned());

    if job.platform == Platform::Instagram {
        if let Some(cookie_file) = &cfg.cookie_file {
            argv.push("--cookies".to_string());
            argv.push(cookie_file.to_string_lossy().into_owned());
        }
        argv.push("-o".to_string());
        argv.push("extractor.instagram.include=posts,stories,highlights,reels".to_string());
    }

    argv.push(url.to_string());
    argv.push("-v".to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cfg() -> MdqConfig {
        MdqConfig::default()
    }

    #[test]
    fn argv_core_contract() {
        let job = Job::new(1, "someuser".to_string(), Platform::Tiktok, None, None);
        let argv = build_argv(
            &cfg(),
            Path::new("/dl"),
            &job,
            Path::new("/dl/tiktok/someuser"),
            "https://www.tiktok.com/@someuser",
        );
        assert_eq!(argv[0], "gallery-dl");
        let archive_pos = argv.iter().position(|a| a == "--download-archive").unwrap();
        assert_eq!(argv[archive_pos + 1], "/dl/tiktok/someuser/.archive.txt");
        let d_pos = argv.iter().position(|a| a == "-d").unwrap();
        assert_eq!(argv[d_pos + 1], "/dl");
        assert_eq!(argv[argv.len() - 2], "https://www.tiktok.com/@someuser");
        assert_eq!(argv[argv.len() - 1], "-v");
    }

    #[test]
    fn instagram_gets_cookies_and_include_option() {
        let mut cfg = cfg();
        cfg.cookie_file = Some(PathBuf::from("/data/cookies.txt"));
        let job = Job::new(1, "someuser".to_string(), Platform::Instagram, None, None);
        let argv = build_argv(
            &cfg,
            Path::new("/dl"),
            &job,
            Path::new("/dl/instagram/someuser"),
            "https://www.instagram.com/someuser/",
        );
        let cookie_pos = argv.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(argv[cookie_pos + 1], "/data/cookies.txt");
        assert!(argv
            .iter()
            .any(|a| a == "extractor.instagram.include=posts,stories,highlights,reels"));
    }

    #[test]
    fn command_prefix_is_split_into_argv() {
        let mut cfg = cfg();
        cfg.fetch_command = "/usr/bin/env gallery-dl".to_string();
        let job = Job::new(1, "x".to_string(), Platform::External, None, None);
        let argv = build_argv(&cfg, Path::new("/dl"), &job, Path::new("/dl/external/x"), "https://example.com/a");
        assert_eq!(argv[0], "/usr/bin/env");
        assert_eq!(argv[1], "gallery-dl");
    }

    #[test]
    fn empty_command_yields_empty_argv() {
        let mut cfg = cfg();
        cfg.fetch_command = "   ".to_string();
        let job = Job::new(1, "x".to_string(), Platform::External, None, None);
        assert!(build_argv(&cfg, Path::new("/dl"), &job, Path::new("/dl/x"), "https://e.com").is_empty());
    }
}
