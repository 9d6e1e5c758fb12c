//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ToolError`: a tool invocation was rejected or could not be served
//! - `RegistryError`: the handler table disagrees with the catalog
//! - `OrchestratorError`: what a single conversational turn ended with

use crate::tool::LIST_ALL_EXPENSE;
use pocket_ledger_expense::ExpenseError;
use std::fmt;

/// Errors from validating or executing a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The model named a tool that is not in the catalog.
    UndeclaredTool { name: String },
    /// A required argument was absent.
    MissingArgument { tool: String, argument: String },
    /// An argument was present but unusable.
    InvalidArgument {
        tool: String,
        argument: String,
        reason: String,
    },
    /// The arguments did not form a valid expense.
    InvalidExpense { tool: String, source: ExpenseError },
    /// The listing bounds were individually valid but did not form a range.
    InvalidRange { tool: String, source: ExpenseError },
    /// The store failed after the retry budget was spent.
    StoreUnavailable { tool: String, reason: String },
}

impl ToolError {
    /// Returns true if the invocation itself was at fault.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument { .. }
                | Self::InvalidArgument { .. }
                | Self::InvalidExpense { .. }
                | Self::InvalidRange { .. }
        )
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndeclaredTool { name } => write!(f, "tool '{name}' is not declared"),
            Self::MissingArgument { tool, argument } => {
                write!(f, "tool '{tool}' is missing required argument '{argument}'")
            }
            Self::InvalidArgument {
                tool,
                argument,
                reason,
            } => write!(f, "invalid argument '{argument}' for tool '{tool}': {reason}"),
            Self::InvalidExpense { tool, source } => {
                write!(f, "tool '{tool}' got an invalid expense: {source}")
            }
            Self::InvalidRange { tool, source } => {
                write!(f, "tool '{tool}' got an invalid date range: {source}")
            }
            Self::StoreUnavailable { tool, reason } => {
                write!(f, "tool '{tool}' could not reach the store: {reason}")
            }
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidExpense { source, .. } | Self::InvalidRange { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from assembling the tool registry at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler was registered for a tool the catalog does not declare.
    UnknownTool { name: String },
    /// A declared tool has no handler.
    MissingHandler { name: String },
    /// Two handlers were registered for the same tool.
    DuplicateHandler { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => {
                write!(f, "handler registered for undeclared tool '{name}'")
            }
            Self::MissingHandler { name } => write!(f, "no handler for declared tool '{name}'"),
            Self::DuplicateHandler { name } => {
                write!(f, "more than one handler registered for tool '{name}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Outcome kinds of a failed conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The model proposed arguments for `tool` that failed validation.
    Validation { tool: String, reason: String },
    /// The model broke the tool-calling contract.
    Protocol { reason: String },
    /// The model could not be reached after retrying.
    ModelUnavailable { reason: String },
    /// The store could not be reached after retrying.
    StoreUnavailable { reason: String },
    /// The model returned no text to relay.
    EmptyReply,
}

impl OrchestratorError {
    /// Text that is safe to send back to the end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation { tool, .. } if tool == LIST_ALL_EXPENSE => {
                "Sorry, I couldn't understand those dates. Please give them as YYYY-MM-DD, with the start date no later than the end date."
            }
            Self::Validation { .. } => {
                "Sorry, I couldn't understand that expense. Please include a name, a date (YYYY-MM-DD), an amount, and a category (food, clothing, housing, or transport)."
            }
            Self::ModelUnavailable { .. } | Self::StoreUnavailable { .. } => {
                "Sorry, I can't reach my services right now. Please try again in a moment."
            }
            Self::EmptyReply => "Sorry, I don't have an answer for that. Please try rephrasing.",
            Self::Protocol { .. } => "Sorry, something went wrong on my side.",
        }
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { reason, .. } => write!(f, "tool arguments rejected: {reason}"),
            Self::Protocol { reason } => write!(f, "tool protocol violation: {reason}"),
            Self::ModelUnavailable { reason } => write!(f, "model unavailable: {reason}"),
            Self::StoreUnavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::EmptyReply => write!(f, "model returned an empty reply"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<ToolError> for OrchestratorError {
    fn from(err: ToolError) -> Self {
        let reason = err.to_string();
        match err {
            ToolError::UndeclaredTool { .. } => Self::Protocol { reason },
            ToolError::StoreUnavailable { .. } => Self::StoreUnavailable { reason },
            ToolError::MissingArgument { tool, .. }
            | ToolError::InvalidArgument { tool, .. }
            | ToolError::InvalidExpense { tool, .. }
            | ToolError::InvalidRange { tool, .. } => Self::Validation { tool, reason },
        }
    }
}
