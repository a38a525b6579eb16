//! `mdq status` – show the live queue via the control socket.

use anyhow::Result;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_status() -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(&path, &Request::List).await?;
    let jobs = reply.jobs.unwrap_or_default();
    if jobs.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:<10} {:<6} {:<24} {}",
        "ID", "STATUS", "PLATFORM", "FILES", "SUBJECT", "MESSAGE"
    );
    for job in jobs {
        println!(
            "{:<6} {:<10} {:<10} {:<6} {:<24} {}",
            job.id,
            job.status.as_str(),
            job.platform.as_str(),
            job.files_completed,
            job.subject,
            job.message
        );
    }
    Ok(())
}
