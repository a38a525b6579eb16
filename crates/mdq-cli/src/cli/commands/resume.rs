//! `mdq resume <id>` – re-queue a paused job on the running queue.

use anyhow::Result;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_resume(id: u64) -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(&path, &Request::Resume { id }).await?;
    if reply.ok {
        println!("Resumed job {id}");
    } else {
        anyhow::bail!("{}", reply.error.unwrap_or_else(|| "unknown error".into()));
    }
    Ok(())
}
