//! Shared identity types for the pocket-ledger assistant.
//!
//! Every other pocket-ledger crate keys its data or its logs on something
//! defined here.

pub mod id;
pub mod scope;

pub use id::TurnId;
pub use scope::{DEFAULT_SCOPE_PREFIX, PlatformUserId, UserScope};
