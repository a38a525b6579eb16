//! `mdq pause <id>` – pause an active job on the running queue.

use anyhow::Result;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_pause(id: u64) -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(&path, &Request::Pause { id }).await?;
    if reply.ok {
        println!("Paused job {id}");
    } else {
        anyhow::bail!("{}", reply.error.unwrap_or_else(|| "unknown error".into()));
    }
    Ok(())
}
