//! Minimal HTTP/1.1 server with Range GET support for fetcher tests.
//!
//! Serves one static body at `/file` and records every request (range
//! offset, bytes actually served) so tests can assert on traffic — e.g.
//! that a resumed download only transferred the missing tail. A truncation
//! option makes the first response stop early to simulate a dropped
//! connection.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// One observed GET.
#[derive(Debug, Clone)]
pub struct RequestLog {
    /// Start offset of a `Range: bytes=N-` header, if any.
    pub range_start: Option<u64>,
    /// Body bytes actually written to the socket.
    pub served: u64,
}

#[derive(Default)]
pub struct ServerStats {
    requests: Mutex<Vec<RequestLog>>,
}

impl ServerStats {
    pub fn requests(&self) -> Vec<RequestLog> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn bytes_served(&self) -> u64 {
        self.requests.lock().unwrap().iter().map(|r| r.served).sum()
    }
}

pub struct ServerHandle {
    pub file_url: String,
    pub missing_url: String,
    pub stats: Arc<ServerStats>,
}

/// Starts the server in a background thread. If `truncate_first_at` is set,
/// the first response body is cut off after that many bytes and the
/// connection closed, despite advertising the full length.
pub fn start(body: Vec<u8>, truncate_first_at: Option<u64>) -> ServerHandle {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let stats = Arc::new(ServerStats::default());
    let body = Arc::new(body);
    let truncate_pending = Arc::new(AtomicBool::new(truncate_first_at.is_some()));

    {
        let stats = Arc::clone(&stats);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let body = Arc::clone(&body);
                let stats = Arc::clone(&stats);
                let truncate_pending = Arc::clone(&truncate_pending);
                thread::spawn(move || {
                    handle(stream, &body, &stats, truncate_first_at, &truncate_pending)
                });
            }
        });
    }

    ServerHandle {
        file_url: format!("http://127.0.0.1:{port}/file"),
        missing_url: format!("http://127.0.0.1:{port}/nope"),
        stats,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    stats: &ServerStats,
    truncate_first_at: Option<u64>,
    truncate_pending: &AtomicBool,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (path, range_start) = parse_request(request);
    let total = body.len() as u64;

    if path != "/file" {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        stats.requests.lock().unwrap().push(RequestLog {
            range_start,
            served: 0,
        });
        return;
    }

    let start = range_start.unwrap_or(0).min(total);
    let slice = &body[start as usize..];
    let (status, extra) = if range_start.is_some() {
        (
            "206 Partial Content",
            format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                start,
                total.saturating_sub(1),
                total
            ),
        )
    } else {
        ("200 OK", String::new())
    };

    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra}Accept-Ranges: bytes\r\nConnection: close\r\n\r\n",
        slice.len()
    );
    if stream.write_all(header.as_bytes()).is_err() {
        return;
    }

    let to_serve = if truncate_pending.swap(false, Ordering::SeqCst) {
        let cut = truncate_first_at.unwrap_or(0) as usize;
        &slice[..cut.min(slice.len())]
    } else {
        slice
    };
    let served = match stream.write_all(to_serve) {
        Ok(()) => to_serve.len() as u64,
        Err(_) => 0,
    };
    let _ = stream.flush();
    stats.requests.lock().unwrap().push(RequestLog {
        range_start,
        served,
    });
}

/// Returns (path, range start offset for `Range: bytes=N-` headers).
fn parse_request(request: &str) -> (&str, Option<u64>) {
    let mut path = "";
    let mut range = None;
    for (i, line) in request.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if i == 0 {
            path = line.split_whitespace().nth(1).unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(offsets) = value.strip_prefix("bytes=") {
                    if let Some((start, _)) = offsets.split_once('-') {
                        range = start.trim().parse::<u64>().ok();
                    }
                }
            }
        }
    }
    (path, range)
}
