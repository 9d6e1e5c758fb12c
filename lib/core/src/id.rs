//! Turn identifiers.
//!
//! A [`TurnId`] tags every log line produced while answering one inbound
//! text message. Nothing persists it.

use std::fmt;
use ulid::Ulid;

/// Identifier of one conversation turn. Renders as `turn_<ULID>`, so ids
/// sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(Ulid);

impl TurnId {
    /// A fresh id stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn_{}", self.0)
    }
}
