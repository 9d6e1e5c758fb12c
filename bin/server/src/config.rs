//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `GEMINI__API_KEY` or `ASSISTANT__TIMEZONE`.

use pocket_ledger_ai::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use pocket_ledger_conversation::{DEFAULT_TIMEZONE, DirectReplyMode};
use pocket_ledger_core::DEFAULT_SCOPE_PREFIX;
use pocket_ledger_messaging::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PostgreSQL connection URL. Without one, expenses live in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Messaging platform settings.
    pub line: LineSettings,

    /// Model settings.
    pub gemini: GeminiSettings,

    /// Assistant behavior.
    #[serde(default)]
    pub assistant: AssistantSettings,
}

/// LINE Messaging API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LineSettings {
    /// Long-lived channel access token.
    pub channel_access_token: String,

    /// API base URL.
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
}

/// Gemini settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    /// API key.
    pub api_key: String,

    /// Model identifier.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_gemini_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl GeminiSettings {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Assistant behavior settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSettings {
    /// IANA timezone used for the local time injected into prompts.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Prefix of every user's storage scope.
    #[serde(default = "default_scope_prefix")]
    pub scope_prefix: String,

    /// Upper bound on handling one text message, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Handling of model replies that do not call a tool.
    #[serde(default)]
    pub direct_reply: DirectReplyMode,
}

impl AssistantSettings {
    /// Upper bound on handling one text message.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_line_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_gemini_timeout_seconds() -> u64 {
    20
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_scope_prefix() -> String {
    DEFAULT_SCOPE_PREFIX.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            scope_prefix: default_scope_prefix(),
            request_timeout_seconds: default_request_timeout_seconds(),
            direct_reply: DirectReplyMode::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The database URL, treating a blank value as unset.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(overrides: &[(&str, &str)]) -> Result<ServerConfig, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }

    #[test]
    fn assistant_settings_have_correct_defaults() {
        let settings = AssistantSettings::default();
        assert_eq!(settings.timezone, "Asia/Taipei");
        assert_eq!(settings.scope_prefix, "accounting");
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.direct_reply, DirectReplyMode::Resend);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = load(&[
            ("line.channel_access_token", "line-token"),
            ("gemini.api_key", "gemini-key"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(config.database_url().is_none());
        assert_eq!(config.line.api_base_url, "https://api.line.me");
        assert_eq!(config.gemini.model, "gemini-1.5-flash-latest");
        assert_eq!(config.gemini.timeout(), Duration::from_secs(20));
        assert!((config.gemini.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("line.channel_access_token", "line-token"),
            ("gemini.api_key", "gemini-key"),
            ("database_url", "  "),
            ("assistant.direct_reply", "reuse"),
            ("assistant.scope_prefix", "ledger"),
        ])
        .unwrap();

        assert!(config.database_url().is_none());
        assert_eq!(config.assistant.direct_reply, DirectReplyMode::Reuse);
        assert_eq!(config.assistant.scope_prefix, "ledger");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(load(&[("gemini.api_key", "gemini-key")]).is_err());
    }
}
