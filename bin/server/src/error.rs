//! Domain error types for server operations.
//!
//! `ServerError` covers startup and is fatal there only. `WebhookError` is
//! request scoped and maps onto an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Errors that stop the server from starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// A collaborator client could not be built.
    Client { details: String },
    /// The tool registry is inconsistent with the catalog.
    Registry { details: String },
    /// The listener could not be bound or the server failed.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Client { details } => write!(f, "client setup error: {details}"),
            Self::Registry { details } => write!(f, "tool registry error: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for ServerError {}

/// Errors from handling a webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The body was not a valid webhook payload.
    MalformedPayload { details: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload { details } => write!(f, "malformed webhook payload: {details}"),
        }
    }
}

impl std::error::Error for WebhookError {}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            Self::MalformedPayload { details } => {
                tracing::warn!(%details, "rejected webhook payload");
                (StatusCode::BAD_REQUEST, "malformed payload").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_is_bad_request() {
        let response = WebhookError::MalformedPayload {
            details: "expected value at line 1".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_error_display() {
        let err = ServerError::Database {
            details: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "database error: connection refused");
    }
}
