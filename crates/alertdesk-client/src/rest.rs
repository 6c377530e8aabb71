//! REST client for the notification endpoints.
//!
//! - `GET  {base}/notifications?limit=N&page=1` - newest-first page plus unread count
//! - `PUT  {base}/notifications/read-all`       - mark every notification read
//!
//! All requests carry `Authorization: Bearer <token>`.

use std::time::Duration;

use alertdesk_core::Notification;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ClientError, Result};

/// One page of notifications as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Wrapped { data: NotificationPage },
    Flat(NotificationPage),
}

impl From<ListResponse> for NotificationPage {
    fn from(response: ListResponse) -> Self {
        match response {
            ListResponse::Wrapped { data } => data,
            ListResponse::Flat(page) => page,
        }
    }
}

/// Source of notification snapshots.
///
/// Implemented by [`NotificationApi`]; tests substitute their own.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Fetch the most recent `limit` notifications.
    async fn fetch(&self, limit: usize) -> Result<NotificationPage>;

    /// Mark every notification of the current user read.
    async fn mark_all_read(&self) -> Result<()>;
}

/// HTTP client for the portal notification API.
#[derive(Debug, Clone)]
pub struct NotificationApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout_secs: u64,
}

impl NotificationApi {
    /// Create a client for `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout_secs, err.to_string())
        } else if err.is_connect() {
            ClientError::ConnectionFailed(err.to_string())
        } else {
            ClientError::HttpError(err)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_http_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl NotificationSource for NotificationApi {
    async fn fetch(&self, limit: usize) -> Result<NotificationPage> {
        debug!(limit, "fetching notifications");

        let response = self
            .client
            .get(self.url("/notifications"))
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string()), ("page", "1".to_string())])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let body: ListResponse = response.json().await?;
        let mut page = NotificationPage::from(body);
        page.notifications.truncate(limit);
        debug!(
            count = page.notifications.len(),
            unread = page.unread_count,
            "notifications fetched"
        );
        Ok(page)
    }

    async fn mark_all_read(&self) -> Result<()> {
        debug!("marking all notifications read");

        let response = self
            .client
            .put(self.url("/notifications/read-all"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response).await?;
        Ok(())
    }
}
