//! Feed proxy client

use homebase_common::FeedSnapshot;
use std::time::Duration;

use crate::config::WatchConfig;
use crate::error::{WatchError, WatchResult};

const USER_AGENT: &str = concat!("homebase-watch/", env!("CARGO_PKG_VERSION"));

/// Retrieves canonical snapshots from the feed proxy
#[derive(Debug, Clone)]
pub struct FeedClient {
    http_client: reqwest::Client,
    feed_url: String,
    role_header: String,
    role: String,
}

impl FeedClient {
    pub fn new(
        feed_url: impl Into<String>,
        role_header: impl Into<String>,
        role: impl Into<String>,
        timeout: Duration,
    ) -> WatchResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            feed_url: feed_url.into(),
            role_header: role_header.into(),
            role: role.into(),
        })
    }

    pub fn from_config(config: &WatchConfig) -> WatchResult<Self> {
        Self::new(
            config.feed_url.clone(),
            config.feed_role_header.clone(),
            config.feed_role.clone(),
            config.feed_timeout(),
        )
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// One complete snapshot, or why this cycle has none
    pub async fn fetch(&self) -> WatchResult<FeedSnapshot> {
        let response = self
            .http_client
            .get(&self.feed_url)
            .header(self.role_header.as_str(), self.role.as_str())
            .send()
            .await
            .map_err(|e| WatchError::FeedUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WatchError::FeedStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| WatchError::FeedUnreachable(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| WatchError::FeedMalformed(e.to_string()))
    }
}
