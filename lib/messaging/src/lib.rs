//! Messaging platform plumbing for pocket-ledger.
//!
//! This crate provides:
//!
//! - **Events**: the inbound webhook payload model
//! - **Client**: the outbound reply/push interface and its LINE implementation
//! - **Router**: per-event classification, orchestration and reply delivery

pub mod client;
pub mod error;
pub mod event;
pub mod router;

pub use client::{DEFAULT_API_BASE_URL, LineClient, LineConfig, MessagingClient};
pub use error::MessagingError;
pub use event::{Beacon, Event, MessageContent, Postback, Source, WebhookPayload};
pub use router::{EventOutcome, EventRouter, PromptResponder, RouterConfig, sticker_ack};
