//! The per-request conversation turn.

use pocket_ledger_core::TurnId;

/// Marker placed between the user's text and the injected local time.
pub const LOCAL_TIME_LABEL: &str = "Local time:";

/// One inbound prompt and the context injected around it.
///
/// Lives for a single orchestration and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Correlates the log lines of this turn.
    pub id: TurnId,
    /// The user's text as received.
    pub prompt: String,
    /// Local wall-clock time when the turn started.
    pub local_time: String,
}

impl ConversationTurn {
    /// Starts a turn.
    #[must_use]
    pub fn new(prompt: impl Into<String>, local_time: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            prompt: prompt.into(),
            local_time: local_time.into(),
        }
    }

    /// The prompt with the local time appended, so the model can resolve
    /// words like "today" or "last week".
    #[must_use]
    pub fn augmented_prompt(&self) -> String {
        format!("{} {LOCAL_TIME_LABEL} {}", self.prompt, self.local_time)
    }
}
