//! A single chat exchange with the model.
//!
//! The session keeps the content history of one turn so a function result can
//! be sent back in the context of the call that produced it.

use pocket_ledger_ai::{
    Content, FunctionDeclaration, GenerateRequest, LlmError, ModelBackend, ModelResponse,
    RetryPolicy,
};
use serde_json::Value as JsonValue;
use tracing::debug;

/// History-carrying chat over a [`ModelBackend`].
pub struct ChatSession<'a> {
    backend: &'a dyn ModelBackend,
    retry: RetryPolicy,
    tools: Vec<FunctionDeclaration>,
    temperature: Option<f32>,
    history: Vec<Content>,
}

impl<'a> ChatSession<'a> {
    /// Opens an empty session without tools.
    #[must_use]
    pub fn new(backend: &'a dyn ModelBackend, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            tools: Vec::new(),
            temperature: None,
            history: Vec::new(),
        }
    }

    /// Offers `tools` on every request of this session.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<FunctionDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sends user text.
    pub async fn send_text(&mut self, text: &str) -> Result<ModelResponse, LlmError> {
        self.send(Content::user_text(text)).await
    }

    /// Sends a function result for the call the model just made.
    pub async fn send_function_response(
        &mut self,
        name: &str,
        response: JsonValue,
    ) -> Result<ModelResponse, LlmError> {
        self.send(Content::function_response(name, response)).await
    }

    /// Content exchanged so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    async fn send(&mut self, content: Content) -> Result<ModelResponse, LlmError> {
        self.history.push(content);
        let request = GenerateRequest::new(self.history.clone())
            .with_tools(self.tools.clone())
            .with_temperature(self.temperature);

        let backend = self.backend;
        let result = self
            .retry
            .run_with_hint(
                "model.generate",
                LlmError::is_retryable,
                LlmError::retry_after,
                || backend.generate(&request),
            )
            .await;

        match result {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    tokens = response.usage.total(),
                    history = self.history.len(),
                    "model turn complete"
                );
                self.history.push(response.to_content());
                Ok(response)
            }
            Err(e) => {
                // keep history consistent with what the model has seen
                self.history.pop();
                Err(e)
            }
        }
    }
}
