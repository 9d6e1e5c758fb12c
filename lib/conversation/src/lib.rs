//! Conversation orchestration for pocket-ledger.
//!
//! This crate provides:
//!
//! - **Tool Catalog**: the functions the model may call, and typed argument access
//! - **Tool Registry**: name to handler dispatch, checked against the catalog at startup
//! - **Chat Session**: history-carrying exchange with a model backend
//! - **Orchestrator**: one prompt through the model, at most one tool call, one reply

pub mod clock;
pub mod error;
pub mod handler;
pub mod message;
pub mod orchestrator;
pub mod session;
pub mod tool;

pub use clock::{DEFAULT_TIMEZONE, LocalClock};
pub use error::{OrchestratorError, RegistryError, ToolError};
pub use handler::{
    ListExpensesHandler, RecordExpenseHandler, ToolHandler, ToolRegistry, ToolRegistryBuilder,
};
pub use message::ConversationTurn;
pub use orchestrator::{DirectReplyMode, OrchestratorConfig, ToolCallOrchestrator};
pub use session::ChatSession;
pub use tool::{
    LIST_ALL_EXPENSE, ParamType, ParameterSpec, RECORD_EXPENSE, ToolArguments, ToolCatalog,
    ToolDefinition, ToolInvocation,
};
