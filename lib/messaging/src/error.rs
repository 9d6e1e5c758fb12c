//! Error types for the messaging crate.

use std::fmt;

/// Errors from delivering a message to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// The platform answered with a non-success status.
    Rejected { status: u16, detail: String },
    /// The request never got an answer.
    Transport { reason: String },
    /// The client is misconfigured.
    InvalidConfig { reason: String },
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, detail } => {
                write!(f, "messaging API rejected request (HTTP {status}): {detail}")
            }
            Self::Transport { reason } => write!(f, "messaging API unreachable: {reason}"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid messaging configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for MessagingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_includes_status() {
        let err = MessagingError::Rejected {
            status: 400,
            detail: "Invalid reply token".to_string(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("Invalid reply token"));
    }
}
