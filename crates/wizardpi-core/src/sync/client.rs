use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::NetworkError;
use crate::types::{ServerResponse, UserActionPayload, UserId};
use crate::util::blob_preview;
use crate::util::http;

use super::SyncTransport;

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    #[serde(default)]
    avatar_url: Option<String>,
}

/// HTTP client for the backend's user-action and avatar endpoints.
///
/// No retries and no local fallback: the caller decides what to do with a
/// failed `send`.
pub struct RemoteSyncClient {
    client: Client,
    action_url: String,
    avatar_url: String,
}

impl RemoteSyncClient {
    pub fn new(config: &Config) -> Result<Self, NetworkError> {
        Ok(Self {
            client: http::build_client(&config.sync)?,
            action_url: config.action_url(),
            avatar_url: config.avatar_url(),
        })
    }

    /// Client against explicit endpoint URLs, sharing the global HTTP pool.
    pub fn with_urls(action_url: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            client: http::client().clone(),
            action_url: action_url.into(),
            avatar_url: avatar_url.into(),
        }
    }

    pub fn action_url(&self) -> &str {
        &self.action_url
    }

    async fn try_fetch_avatar(&self, user_id: UserId) -> Result<Option<String>, NetworkError> {
        let url = format!("{}?user_id={}", self.avatar_url, user_id);
        debug!("Fetching avatar URL: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        debug!("Avatar fetch response status: {}", status);
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: AvatarResponse = response.json().await?;
        Ok(body.avatar_url.filter(|url| !url.is_empty()))
    }
}

#[async_trait]
impl SyncTransport for RemoteSyncClient {
    async fn send(&self, payload: &UserActionPayload) -> Result<ServerResponse, NetworkError> {
        debug!(
            "Sending action {:?}/{:?} for user {} ({}), session {}",
            payload.action,
            payload.action_step,
            payload.user_id,
            payload.username,
            blob_preview(&payload.session_data, 8)
        );

        let response = self
            .client
            .post(&self.action_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Request to {} failed: {}", self.action_url, e);
                NetworkError::Http(e)
            })?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Server returned {} for user {}", status, payload.user_id);
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<ServerResponse>(&body).map_err(|e| {
            error!("Failed to decode response for user {}: {}", payload.user_id, e);
            NetworkError::Decode(e.to_string())
        })
    }

    async fn fetch_avatar(&self, user_id: UserId) -> Option<String> {
        match self.try_fetch_avatar(user_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Error fetching avatar for user {}: {}", user_id, e);
                None
            }
        }
    }
}
