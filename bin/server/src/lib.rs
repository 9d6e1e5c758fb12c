//! Webhook server for the pocket-ledger expense assistant.

pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod webhook;

use axum::Router;
use axum::routing::{get, post};
use state::AppState;
use tower_http::trace::TraceLayer;

/// Builds the HTTP router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(webhook::callback))
        .route("/healthz", get(webhook::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
