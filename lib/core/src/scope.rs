//! Platform user identity and storage scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope prefix used when none is configured.
pub const DEFAULT_SCOPE_PREFIX: &str = "accounting";

/// User identifier as supplied by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformUserId(String);

impl PlatformUserId {
    /// Wraps a platform user id. Returns `None` for blank ids.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage partition holding one end user's expense records.
///
/// Scopes are derived from the platform user id only, so the same user always
/// lands in the same partition regardless of which chat the message came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserScope(String);

impl UserScope {
    /// Resolves the scope of a user under the given prefix.
    #[must_use]
    pub fn for_user(prefix: &str, user: &PlatformUserId) -> Self {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            Self(user.as_str().to_string())
        } else {
            Self(format!("{prefix}/{user}"))
        }
    }

    /// Returns the scope string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
