//! Gofile REST API client (guest accounts, content metadata).
//!
//! Uses the curl Easy API; blocking. Callers run it on a worker thread or
//! `spawn_blocking`.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::retry::{run_with_retry, FetchError, RetryPolicy};

use super::tree::ContentSource;

const API_BASE: &str = "https://api.gofile.io";
/// Static token the gofile web app sends with content fetches.
const WEBSITE_TOKEN: &str = "4fd6sg89d7s6";
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    status: String,
    data: Option<AccountData>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    status: String,
    data: Option<ContentNode>,
}

/// One node of the content tree as returned by `/contents/<id>`.
///
/// Child folders arrive without their own children; the resolver fetches
/// them by id as it recurses. Child files carry their download link.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentNode {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub children: HashMap<String, ContentNode>,
    #[serde(default)]
    pub password: Option<serde_json::Value>,
    #[serde(rename = "passwordStatus", default)]
    pub password_status: Option<String>,
}

impl ContentNode {
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }

    /// True when the content is password-protected and the supplied hash
    /// (if any) was not accepted.
    pub fn password_locked(&self) -> bool {
        self.password.is_some() && self.password_status.as_deref() != Some("passwordOk")
    }
}

/// Authenticated API client. Obtain a guest token with [`ApiClient::login_guest`]
/// before fetching content.
pub struct ApiClient {
    token: Option<String>,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            token: None,
            timeout,
            policy,
        }
    }

    /// Creates a guest account and stores its bearer token.
    pub fn login_guest(&mut self) -> Result<(), FetchError> {
        let timeout = self.timeout;
        let body = run_with_retry(&self.policy, || {
            http_request(&format!("{API_BASE}/accounts"), &[], timeout, true)
        })?;
        let parsed: AccountResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Api(format!("account response: {e}")))?;
        if parsed.status != "ok" {
            return Err(FetchError::Api(format!(
                "account creation failed: {}",
                parsed.status
            )));
        }
        match parsed.data {
            Some(data) => {
                self.token = Some(data.token);
                Ok(())
            }
            None => Err(FetchError::Api("account response missing token".into())),
        }
    }

    /// Bearer token for download requests; empty until `login_guest` succeeds.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn contents_url(content_id: &str, password_hash: Option<&str>) -> String {
        let mut url = format!(
            "{API_BASE}/contents/{content_id}?cache=true&sortField=createTime&sortDirection=1"
        );
        if let Some(hash) = password_hash {
            url.push_str("&password=");
            url.push_str(hash);
        }
        url
    }
}

impl ContentSource for ApiClient {
    fn contents(
        &self,
        content_id: &str,
        password_hash: Option<&str>,
    ) -> Result<ContentNode, FetchError> {
        let url = Self::contents_url(content_id, password_hash);
        let mut headers = vec![format!("X-Website-Token: {WEBSITE_TOKEN}")];
        if let Some(token) = &self.token {
            headers.push(format!("Authorization: Bearer {token}"));
            headers.push(format!("Cookie: accountToken={token}"));
        }
        let timeout = self.timeout;
        let body = run_with_retry(&self.policy, || {
            http_request(&url, &headers, timeout, false)
        })?;
        let parsed: ContentResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Api(format!("content response: {e}")))?;
        if parsed.status != "ok" {
            return Err(FetchError::Api(format!("API error: {}", parsed.status)));
        }
        parsed
            .data
            .ok_or_else(|| FetchError::Api("content response missing data".into()))
    }
}

/// One GET/POST returning the response body. Non-2xx statuses are errors.
fn http_request(
    url: &str,
    headers: &[String],
    timeout: Duration,
    post: bool,
) -> Result<Vec<u8>, FetchError> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout.saturating_mul(2))?;
    easy.accept_encoding("gzip")?;
    if post {
        easy.post(true)?;
        easy.post_fields_copy(b"{}")?;
    }

    let mut list = curl::easy::List::new();
    for header in headers {
        list.append(header)?;
    }
    if post {
        list.append("Content-Type: application/json")?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()? as u32;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(body)
}
