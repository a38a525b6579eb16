//! `mdq add <subject>` – enqueue a job on the running queue.

use anyhow::Result;

use mdq_core::job::Platform;

use super::super::control_socket::{default_control_socket_path, send_request, Request};

pub async fn run_add(
    subject: &str,
    platform: Platform,
    url: Option<String>,
    folder: Option<String>,
) -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = send_request(
        &path,
        &Request::Add {
            subject: subject.to_string(),
            platform,
            url,
            folder,
        },
    )
    .await?;
    match (reply.ok, reply.job_id) {
        (true, Some(id)) => println!("Queued job {id} for {subject}"),
        (true, None) => println!("Queued {subject}"),
        (false, _) => {
            anyhow::bail!("{}", reply.error.unwrap_or_else(|| "unknown error".into()))
        }
    }
    Ok(())
}
