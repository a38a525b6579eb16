//! Control socket: server (during `mdq run`) and client (for the other
//! subcommands). One JSON request line per connection, one JSON reply line.

use anyhow::{Context, Result};
use mdq_core::job::{JobSnapshot, Platform};
use mdq_core::queue::DownloadQueue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    List,
    Pause {
        id: u64,
    },
    Resume {
        id: u64,
    },
    Remove {
        id: u64,
    },
    Clear,
    Add {
        subject: String,
        platform: Platform,
        url: Option<String>,
        folder: Option<String>,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<JobSnapshot>>,
}

impl Reply {
    fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    fn err(e: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            error: Some(e.to_string()),
            ..Self::default()
        }
    }
}

/// Socket path under the XDG state dir (`~/.local/state/mdq/control.sock`).
pub fn default_control_socket_path() -> Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mdq")?.get_state_home();
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("control.sock"))
}

/// Spawns a task that serves queue operations on `path`. One request per
/// connection; malformed requests get an error reply and are otherwise
/// ignored.
pub fn spawn_control_listener(
    queue: DownloadQueue,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let queue = queue.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &queue).await {
                            tracing::debug!("control connection: {e}");
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {e}"),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(stream: UnixStream, queue: &DownloadQueue) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let Some(line) = lines.next_line().await? else {
        return Ok(());
    };
    let reply = match serde_json::from_str::<Request>(&line) {
        Ok(request) => apply(queue, request),
        Err(e) => Reply::err(format!("bad request: {e}")),
    };
    let mut out = serde_json::to_string(&reply)?;
    out.push('\n');
    write.write_all(out.as_bytes()).await?;
    Ok(())
}

fn apply(queue: &DownloadQueue, request: Request) -> Reply {
    match request {
        Request::List => Reply {
            ok: true,
            jobs: Some(queue.list()),
            ..Reply::default()
        },
        Request::Pause { id } => match queue.pause(id) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::err(e),
        },
        Request::Resume { id } => match queue.resume(id) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::err(e),
        },
        Request::Remove { id } => match queue.delete(id) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::err(e),
        },
        Request::Clear => {
            queue.clear_finished();
            Reply::ok()
        }
        Request::Add {
            subject,
            platform,
            url,
            folder,
        } => match queue.enqueue(&subject, platform, url, folder) {
            Ok(id) => Reply {
                ok: true,
                job_id: Some(id),
                ..Reply::default()
            },
            Err(e) => Reply::err(e),
        },
    }
}

/// Sends one request to a live `mdq run` and returns its reply.
pub async fn send_request(path: &Path, request: &Request) -> Result<Reply> {
    let mut stream = UnixStream::connect(path)
        .await
        .with_context(|| "no running `mdq run` found (control socket unavailable)")?;
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    let mut reader = BufReader::new(stream).lines();
    let reply_line = reader
        .next_line()
        .await?
        .context("connection closed without a reply")?;
    Ok(serde_json::from_str(&reply_line)?)
}
