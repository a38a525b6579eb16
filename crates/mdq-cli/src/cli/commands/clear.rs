//! `mdq clear` – drop all completed/failed jobs from the running queue.

use anyhow::Result;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_clear() -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(&path, &Request::Clear).await?;
    if reply.ok {
        println!("Cleared finished jobs");
    } else {
        anyhow::bail!("{}", reply.error.unwrap_or_else(|| "unknown error".into()));
    }
    Ok(())
}
