//! Best-effort forwarding of submissions to the remote results service.
//! No retries: callers keep local data as the source of truth.
use crate::domain::models::Submission;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no {0} endpoint configured")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait SubmissionRemote: Send + Sync {
    async fn send(&self, submission: &Submission) -> Result<(), RemoteError>;
    async fn fetch_all(&self) -> Result<Vec<Submission>, RemoteError>;
}

pub struct HttpRemote {
    client: reqwest::Client,
    submit_url: Option<String>,
    results_url: Option<String>,
}

impl HttpRemote {
    pub fn new(
        submit_url: Option<String>,
        results_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            submit_url,
            results_url,
        })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SubmissionRemote for HttpRemote {
    async fn send(&self, submission: &Submission) -> Result<(), RemoteError> {
        let url = self
            .submit_url
            .as_deref()
            .ok_or(RemoteError::NotConfigured("submit"))?;

        // The endpoint takes a list of submissions.
        let resp = self
            .client
            .post(url)
            .json(&[submission])
            .send()
            .await?;
        check_status(resp).await?;
        tracing::info!("Submission {} forwarded to remote", submission.id());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Submission>, RemoteError> {
        let url = self
            .results_url
            .as_deref()
            .ok_or(RemoteError::NotConfigured("results"))?;

        let resp = check_status(self.client.get(url).send().await?).await?;
        let body: Option<Vec<Value>> = resp.json().await?;
        Ok(decode_entries(body.unwrap_or_default()))
    }
}

/// Keeps every entry that decodes. A bad record is logged and skipped so it
/// cannot hide the rest of the remote results.
pub fn decode_entries(entries: Vec<Value>) -> Vec<Submission> {
    let total = entries.len();
    let submissions: Vec<Submission> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match parse_remote_submission(entry) {
            Ok(submission) => Some(submission),
            Err(e) => {
                tracing::warn!("Skipping remote submission #{}: {}", idx, e);
                None
            }
        })
        .collect();
    if submissions.len() < total {
        tracing::warn!(
            "Decoded {} of {} remote submissions",
            submissions.len(),
            total
        );
    }
    submissions
}

/// Older clients omitted `type` on card sorting submissions.
pub fn parse_remote_submission(mut value: Value) -> Result<Submission, RemoteError> {
    if let Value::Object(map) = &mut value {
        if !map.contains_key("type") && map.contains_key("results") {
            map.insert("type".to_string(), Value::String("card_sorting".to_string()));
        }
    }
    Ok(serde_json::from_value(value)?)
}
