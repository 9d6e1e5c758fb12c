//! Error types for the AI crate.

use std::fmt;
use std::time::Duration;

/// Failure talking to a model provider.
///
/// Variants split into transient ones, which [`LlmError::is_retryable`]
/// reports, and ones a retry cannot fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The provider could not be reached or answered 5xx.
    ProviderUnavailable { provider: String, reason: String },
    /// The request went out but did not complete.
    RequestFailed { reason: String },
    /// The provider answered with something other than a usable turn.
    ResponseParseFailed { reason: String },
    /// No answer within the configured deadline.
    Timeout,
    /// HTTP 429, optionally with the provider's `Retry-After` hint.
    RateLimited { retry_after_secs: Option<u64> },
    /// Credentials or request parameters were refused.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Whether repeating the identical request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable { .. }
            | Self::RequestFailed { .. }
            | Self::Timeout
            | Self::RateLimited { .. } => true,
            Self::ResponseParseFailed { .. } | Self::InvalidConfig { .. } => false,
        }
    }

    /// The provider's requested pause before retrying, if it sent one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "model provider {provider} is unreachable: {reason}")
            }
            Self::RequestFailed { reason } => write!(f, "model call did not complete: {reason}"),
            Self::ResponseParseFailed { reason } => {
                write!(f, "unusable model response: {reason}")
            }
            Self::Timeout => f.write_str("model call exceeded its deadline"),
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "model quota exhausted, retry in {secs}s"),
            Self::RateLimited {
                retry_after_secs: None,
            } => f.write_str("model quota exhausted"),
            Self::InvalidConfig { reason } => write!(f, "model request refused: {reason}"),
        }
    }
}

impl std::error::Error for LlmError {}
