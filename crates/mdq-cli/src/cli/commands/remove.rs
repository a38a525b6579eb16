//! `mdq remove <id>` – delete a job; an active one is stopped first.

use anyhow::Result;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_remove(id: u64) -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(&path, &Request::Remove { id }).await?;
    if reply.ok {
        println!("Removed job {id}");
    } else {
        anyhow::bail!("{}", reply.error.unwrap_or_else(|| "unknown error".into()));
    }
    Ok(())
}
