//! HTTP routes.

use crate::error::WebhookError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use pocket_ledger_messaging::WebhookPayload;
use tracing::{debug, info};

/// `POST /callback`: accepts a webhook delivery.
///
/// Events are handed to background tasks and the platform gets its `200`
/// right away; replies go out through the messaging API later.
pub async fn callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let payload: WebhookPayload =
        serde_json::from_slice(&body).map_err(|e| WebhookError::MalformedPayload {
            details: e.to_string(),
        })?;
    info!(events = payload.events.len(), "webhook received");

    let spawned = state.router.dispatch(payload);
    debug!(tasks = spawned.len(), "events dispatched");

    Ok(StatusCode::OK)
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
