//! One prompt in, one reply out, with at most one tool call in between.

use crate::clock::LocalClock;
use crate::error::OrchestratorError;
use crate::handler::ToolRegistry;
use crate::message::ConversationTurn;
use crate::session::ChatSession;
use crate::tool::ToolInvocation;
use pocket_ledger_ai::{LlmError, ModelBackend, ModelResponse, RetryPolicy};
use pocket_ledger_core::UserScope;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Span, debug, error, info, instrument, warn};

/// What to do when the model answers with text instead of a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectReplyMode {
    /// Ask again as plain chat without tools and relay that answer.
    #[default]
    Resend,
    /// Relay the text the model already returned.
    Reuse,
}

impl fmt::Display for DirectReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resend => f.write_str("resend"),
            Self::Reuse => f.write_str("reuse"),
        }
    }
}

impl FromStr for DirectReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resend" => Ok(Self::Resend),
            "reuse" => Ok(Self::Reuse),
            other => Err(format!("unknown direct reply mode '{other}'")),
        }
    }
}

/// Tunables for [`ToolCallOrchestrator`].
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Sampling temperature sent with every request.
    pub temperature: Option<f32>,
    /// Handling of replies without a tool call.
    pub direct_reply: DirectReplyMode,
    /// Retry budget for model calls.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            temperature: Some(0.8),
            direct_reply: DirectReplyMode::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Drives a prompt through the model and the tool registry.
#[derive(Clone)]
pub struct ToolCallOrchestrator {
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ToolRegistry>,
    clock: LocalClock,
    config: OrchestratorConfig,
}

impl fmt::Debug for ToolCallOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCallOrchestrator")
            .field("model", &self.backend.model())
            .field("registry", &self.registry)
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish()
    }
}

fn model_unavailable(e: LlmError) -> Report<OrchestratorError> {
    OrchestratorError::ModelUnavailable {
        reason: e.to_string(),
    }
    .into()
}

fn non_empty(text: String) -> Result<String, Report<OrchestratorError>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(OrchestratorError::EmptyReply.into());
    }
    Ok(trimmed.to_string())
}

impl ToolCallOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ToolRegistry>,
        clock: LocalClock,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            clock,
            config,
        }
    }

    fn session(&self) -> ChatSession<'_> {
        ChatSession::new(self.backend.as_ref(), self.config.retry)
            .with_temperature(self.config.temperature)
    }

    /// Answers `prompt` on behalf of `scope`.
    ///
    /// When the model calls a tool, the tool runs against `scope` and its
    /// result goes back to the model, whose final text is returned. Without a
    /// tool call no store operation happens.
    ///
    /// # Errors
    ///
    /// Returns the [`OrchestratorError`] kind describing how the turn failed.
    #[instrument(skip_all, fields(scope = %scope, turn_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        scope: &UserScope,
        prompt: &str,
    ) -> Result<String, Report<OrchestratorError>> {
        let turn = ConversationTurn::new(prompt, self.clock.now());
        Span::current().record("turn_id", tracing::field::display(&turn.id));

        let mut session = self
            .session()
            .with_tools(self.registry.catalog().function_declarations());
        let first = session
            .send_text(&turn.augmented_prompt())
            .await
            .map_err(model_unavailable)?;

        let Some(call) = first.function_call() else {
            return self.direct_reply(&turn, first).await;
        };
        let invocation = ToolInvocation::from(call);

        if !self.registry.is_declared(&invocation.name) {
            error!(
                tool = %invocation.name,
                turn_id = %turn.id,
                scope = %scope,
                arguments = %JsonValue::Object(invocation.arguments.clone()),
                "model called an undeclared tool"
            );
            return Err(OrchestratorError::Protocol {
                reason: format!("undeclared tool '{}'", invocation.name),
            }
            .into());
        }

        info!(tool = %invocation.name, "dispatching tool call");
        let result = match self.registry.dispatch(scope, &invocation).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_validation() {
                    warn!(tool = %invocation.name, error = %e, "tool call rejected");
                } else {
                    error!(tool = %invocation.name, error = %e, "tool call failed");
                }
                return Err(OrchestratorError::from(e).into());
            }
        };

        let reply = session
            .send_function_response(&invocation.name, result)
            .await
            .map_err(model_unavailable)?;
        debug!(messages = session.history().len(), "tool round-trip complete");
        non_empty(reply.text())
    }

    async fn direct_reply(
        &self,
        turn: &ConversationTurn,
        first: ModelResponse,
    ) -> Result<String, Report<OrchestratorError>> {
        match self.config.direct_reply {
            DirectReplyMode::Reuse => non_empty(first.text()),
            DirectReplyMode::Resend => {
                let reply = self
                    .session()
                    .send_text(&turn.augmented_prompt())
                    .await
                    .map_err(model_unavailable)?;
                non_empty(reply.text())
            }
        }
    }
}
