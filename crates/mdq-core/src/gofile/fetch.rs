//! Resumable single-file download into a `.part` sibling.
//!
//! Every attempt seeds a Range request from the temp file's current size,
//! appends the body chunk by chunk, verifies the final size, and only then
//! renames into place. The abort token is checked before every chunk write.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::control::AbortHandle;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};

use super::api::USER_AGENT;
use super::tree::FetchUnit;

/// Report progress at most once per this many appended bytes.
const PROGRESS_STEP: u64 = 256 * 1024;

/// Hard ceiling for one transfer; low-speed abort fires long before this
/// on stalled links.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Downloaded,
    AlreadyPresent,
}

pub struct FetchContext<'a> {
    pub policy: &'a RetryPolicy,
    pub connect_timeout: Duration,
    pub abort: &'a AbortHandle,
    /// Receives human-readable progress lines ("Downloading x: 12.5% @ ...").
    pub progress: &'a (dyn Fn(&str) + Sync),
}

/// Downloads one unit to disk, resuming any partial temp file. Skips units
/// whose destination already exists with content.
pub fn fetch_unit(unit: &FetchUnit, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
    let name = display_name(&unit.path);

    if let Ok(meta) = fs::metadata(&unit.path) {
        if meta.len() > 0 {
            (ctx.progress)(&format!("Skipping {name} (exists)"));
            return Ok(Fetched::AlreadyPresent);
        }
    }

    if let Some(parent) = unit.path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = part_path(&unit.path);
    run_with_retry(ctx.policy, || attempt(unit, &name, &tmp, ctx))?;
    fs::rename(&tmp, &unit.path)?;
    (ctx.progress)(&format!("Completed: {name}"));
    Ok(Fetched::Downloaded)
}

/// Temp sibling: `<path>.part`.
pub fn part_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".part");
    PathBuf::from(s)
}

/// Why the write callback stopped the transfer early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    User,
    WrongStatus,
    NoSize,
    Storage,
}

fn attempt(unit: &FetchUnit, name: &str, tmp: &Path, ctx: &FetchContext<'_>) -> Result<(), FetchError> {
    if ctx.abort.is_stopped() {
        return Err(FetchError::Aborted);
    }

    let part_size = fs::metadata(tmp).map(|m| m.len()).unwrap_or(0);
    let file = RefCell::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(tmp)?,
    );

    // Shared between the header and write callbacks. Redirect hops deliver
    // several header blocks; each status line resets the size headers.
    let status = Cell::new(0u32);
    let content_length = Cell::new(None::<u64>);
    let range_total = Cell::new(None::<u64>);
    let stop = Cell::new(None::<Stop>);
    let io_error = RefCell::new(None::<std::io::Error>);
    let downloaded = Cell::new(part_size);
    let last_report = Cell::new(part_size);
    let started = Instant::now();

    let expected_total = || {
        if part_size == 0 {
            content_length.get()
        } else {
            range_total.get()
        }
    };

    let mut easy = curl::easy::Easy::new();
    easy.url(&unit.link)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(ctx.connect_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(TRANSFER_TIMEOUT)?;
    if part_size > 0 {
        easy.range(&format!("{part_size}-"))?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = std::str::from_utf8(data) {
                let line = line.trim();
                if line.starts_with("HTTP/") {
                    let code = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse::<u32>().ok())
                        .unwrap_or(0);
                    status.set(code);
                    content_length.set(None);
                    range_total.set(None);
                } else if let Some((k, v)) = line.split_once(':') {
                    let v = v.trim();
                    if k.eq_ignore_ascii_case("content-length") {
                        content_length.set(v.parse::<u64>().ok());
                    } else if k.eq_ignore_ascii_case("content-range") {
                        // "bytes <start>-<end>/<total>"
                        range_total.set(
                            v.rsplit_once('/')
                                .and_then(|(_, total)| total.trim().parse::<u64>().ok()),
                        );
                    }
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            let code = status.get();
            let status_ok = if part_size > 0 {
                code == 206
            } else {
                code == 200 || code == 206
            };
            if !status_ok {
                stop.set(Some(Stop::WrongStatus));
                return Ok(0);
            }
            let Some(total) = expected_total() else {
                stop.set(Some(Stop::NoSize));
                return Ok(0);
            };
            if ctx.abort.is_stopped() {
                stop.set(Some(Stop::User));
                return Ok(0);
            }
            if let Err(e) = file.borrow_mut().write_all(data) {
                let _ = io_error.borrow_mut().replace(e);
                stop.set(Some(Stop::Storage));
                return Ok(0);
            }
            let done = downloaded.get() + data.len() as u64;
            downloaded.set(done);
            if done.saturating_sub(last_report.get()) >= PROGRESS_STEP || done >= total {
                last_report.set(done);
                let percent = if total > 0 {
                    done as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                let elapsed = started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    (done - part_size) as f64 / elapsed
                } else {
                    0.0
                };
                (ctx.progress)(&format!(
                    "Downloading {name}: {percent:.1}% @ {}",
                    format_rate(rate)
                ));
            }
            Ok(data.len())
        })?;
        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                return Err(match stop.get() {
                    Some(Stop::User) => FetchError::Aborted,
                    Some(Stop::WrongStatus) if part_size > 0 => {
                        FetchError::RangeNotHonored(status.get())
                    }
                    Some(Stop::WrongStatus) => FetchError::Http(status.get()),
                    Some(Stop::NoSize) => FetchError::SizeUnknown,
                    Some(Stop::Storage) => match io_error.borrow_mut().take() {
                        Some(io) => FetchError::Storage(io),
                        None => FetchError::Curl(e),
                    },
                    None => FetchError::Curl(e),
                });
            }
            return Err(FetchError::Curl(e));
        }
    }

    let code = easy.response_code()? as u32;
    if part_size == 0 && !(code == 200 || code == 206) {
        return Err(FetchError::Http(code));
    }
    if part_size > 0 && code != 206 {
        return Err(FetchError::RangeNotHonored(code));
    }

    let expected = expected_total().ok_or(FetchError::SizeUnknown)?;
    let got = fs::metadata(tmp)?.len();
    if got != expected {
        return Err(FetchError::PartialTransfer {
            expected,
            received: got,
        });
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Human-readable throughput: "742.0 B/s", "1.2 MB/s", ...
pub fn format_rate(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    if bytes_per_sec < KB {
        format!("{bytes_per_sec:.1} B/s")
    } else if bytes_per_sec < MB {
        format!("{:.1} KB/s", bytes_per_sec / KB)
    } else if bytes_per_sec < GB {
        format!("{:.1} MB/s", bytes_per_sec / MB)
    } else {
        format!("{:.1} GB/s", bytes_per_sec / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/dl/a/clip.mp4")),
            PathBuf::from("/dl/a/clip.mp4.part")
        );
    }

    #[test]
    fn rate_formatting_units() {
        assert_eq!(format_rate(512.0), "512.0 B/s");
        assert_eq!(format_rate(2048.0), "2.0 KB/s");
        assert_eq!(format_rate(3.5 * 1024.0 * 1024.0), "3.5 MB/s");
        assert_eq!(format_rate(2.0 * 1024.0 * 1024.0 * 1024.0), "2.0 GB/s");
    }

    #[test]
    fn existing_nonempty_destination_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("done.bin");
        fs::write(&dest, b"payload").unwrap();
        let unit = FetchUnit {
            path: dest.clone(),
            // Unroutable link: any network attempt would fail the test.
            link: "http://127.0.0.1:1/never".to_string(),
        };
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let progress = |_: &str| {};
        let ctx = FetchContext {
            policy: &policy,
            connect_timeout: Duration::from_secs(1),
            abort: &AbortHandle::new(),
            progress: &progress,
        };
        let fetched = fetch_unit(&unit, &ctx).unwrap();
        assert_eq!(fetched, Fetched::AlreadyPresent);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn abort_before_attempt_is_not_an_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let unit = FetchUnit {
            path: dir.path().join("x.bin"),
            link: "http://127.0.0.1:1/never".to_string(),
        };
        let abort = AbortHandle::new();
        abort.request_stop();
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let progress = |_: &str| {};
        let ctx = FetchContext {
            policy: &policy,
            connect_timeout: Duration::from_secs(1),
            abort: &abort,
            progress: &progress,
        };
        match fetch_unit(&unit, &ctx) {
            Err(FetchError::Aborted) => {}
            other => panic!("expected Aborted, got {other:?}"),
        }
    }
}
