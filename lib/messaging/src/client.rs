//! Outbound messaging API.

use crate::error::MessagingError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Public LINE Messaging API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.line.me";

/// Longest text a single message may carry.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Sends text to end users.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Answers the event that issued `reply_token`. Tokens are single use and
    /// expire shortly after the event.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), MessagingError>;

    /// Sends `text` to a user, group or room id at any time.
    async fn push(&self, to: &str, text: &str) -> Result<(), MessagingError>;
}

/// Connection settings for [`LineClient`].
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Long-lived channel access token.
    pub channel_access_token: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl LineConfig {
    /// Creates a configuration for the public endpoint.
    #[must_use]
    pub fn new(channel_access_token: impl Into<String>) -> Self {
        Self {
            channel_access_token: channel_access_token.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

fn text_message(text: &str) -> [TextMessage<'_>; 1] {
    let end = text
        .char_indices()
        .nth(MAX_TEXT_CHARS)
        .map_or(text.len(), |(i, _)| i);
    [TextMessage {
        kind: "text",
        text: &text[..end],
    }]
}

/// LINE Messaging API client.
#[derive(Debug, Clone)]
pub struct LineClient {
    client: reqwest::Client,
    config: LineConfig,
}

impl LineClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the HTTP client cannot be built.
    pub fn new(config: LineConfig) -> Result<Self, MessagingError> {
        if config.channel_access_token.trim().is_empty() {
            return Err(MessagingError::InvalidConfig {
                reason: "channel access token is empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MessagingError::InvalidConfig {
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self { client, config })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), MessagingError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.channel_access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MessagingError::Rejected {
                status: status.as_u16(),
                detail: detail.chars().take(200).collect(),
            });
        }
        debug!(path, "message delivered");
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for LineClient {
    #[instrument(skip_all)]
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), MessagingError> {
        let body = ReplyRequest {
            reply_token,
            messages: text_message(text),
        };
        self.post("/v2/bot/message/reply", &body).await
    }

    #[instrument(skip(self, text))]
    async fn push(&self, to: &str, text: &str) -> Result<(), MessagingError> {
        let body = PushRequest {
            to,
            messages: text_message(text),
        };
        self.post("/v2/bot/message/push", &body).await
    }
}
