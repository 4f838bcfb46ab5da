//! Upstream retrieval
//!
//! One bounded-timeout GET per call, classified into success / malformed /
//! empty / unreachable. Parsing beyond "is this JSON" belongs to
//! [`crate::schema`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::SourceError;

const USER_AGENT: &str = concat!("homebase-feed/", env!("CARGO_PKG_VERSION"));

/// Classified result of one retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx with a JSON body
    Success(Value),
    /// 2xx but the body is not JSON
    Malformed(String),
    /// 2xx with an empty body (or a bare `null`)
    Empty,
    /// Connection error, timeout, or non-2xx status
    Unreachable(String),
}

impl FetchOutcome {
    /// Decoded JSON, or the matching per-candidate error
    pub fn into_json(self) -> Result<Value, SourceError> {
        match self {
            FetchOutcome::Success(value) => Ok(value),
            FetchOutcome::Malformed(detail) => Err(SourceError::Malformed(detail)),
            FetchOutcome::Empty => Err(SourceError::NoPositionData(
                "empty response body".to_string(),
            )),
            FetchOutcome::Unreachable(detail) => Err(SourceError::Unreachable(detail)),
        }
    }
}

/// Classify a successful response body
pub fn classify_body(body: &[u8]) -> FetchOutcome {
    if body.iter().all(u8::is_ascii_whitespace) {
        return FetchOutcome::Empty;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => FetchOutcome::Empty,
        Ok(value) => FetchOutcome::Success(value),
        Err(e) => FetchOutcome::Malformed(format!("invalid JSON: {}", e)),
    }
}

/// Retrieves raw payloads from a named upstream
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, target: &str, timeout: Duration) -> FetchOutcome;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, target: &str, timeout: Duration) -> FetchOutcome {
        tracing::debug!(target = %target, timeout_secs = timeout.as_secs(), "Fetching upstream");

        let response = match self
            .client
            .get(target)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return FetchOutcome::Unreachable(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                ))
            }
            Err(e) => return FetchOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::Unreachable(format!("HTTP {}", status.as_u16()));
        }

        match response.bytes().await {
            Ok(body) => classify_body(&body),
            Err(e) => FetchOutcome::Unreachable(format!("body read failed: {}", e)),
        }
    }
}
