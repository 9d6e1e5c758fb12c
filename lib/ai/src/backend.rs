//! Model backend abstraction.
//!
//! Provides a provider-neutral view of a function-calling chat model: a
//! request is the content history plus the declared functions, a response is
//! the parts of the first candidate.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// The author of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user, including function results sent on the user's behalf.
    User,
    /// The model.
    Model,
}

/// A function invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the declared function.
    pub name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub args: JsonMap<String, JsonValue>,
}

impl FunctionCall {
    /// Creates a function call.
    #[must_use]
    pub fn new(name: impl Into<String>, args: JsonMap<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// The result of a function, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Name of the function that produced the result.
    pub name: String,
    /// Result payload.
    pub response: JsonValue,
}

/// One part of a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Function invocation proposal.
    FunctionCall(FunctionCall),
    /// Function result.
    FunctionResponse(FunctionResponse),
}

/// A block of content in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Who produced the content.
    pub role: Role,
    /// Ordered parts.
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user text message.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Creates a function result message.
    #[must_use]
    pub fn function_response(name: impl Into<String>, response: JsonValue) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::FunctionResponse(FunctionResponse {
                name: name.into(),
                response,
            })],
        }
    }

    /// Creates a model message.
    #[must_use]
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// Declaration of a function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Unique function name.
    pub name: String,
    /// What the function does, used by the model to decide relevance.
    pub description: String,
    /// OpenAPI-style object schema of the parameters.
    pub parameters: JsonValue,
}

/// A request to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Conversation history, oldest first.
    pub contents: Vec<Content>,
    /// Functions the model may call. Empty for plain chat.
    pub tools: Vec<FunctionDeclaration>,
    /// Temperature for sampling (0.0 - 1.0).
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    /// Creates a request from a history.
    #[must_use]
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            tools: Vec::new(),
            temperature: None,
        }
    }

    /// Attaches function declarations.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<FunctionDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A response from a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Parts of the first candidate.
    pub parts: Vec<Part>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

impl ModelResponse {
    /// Creates a response from parts.
    #[must_use]
    pub fn new(parts: Vec<Part>, model: impl Into<String>) -> Self {
        Self {
            parts,
            usage: TokenUsage::default(),
            model: model.into(),
        }
    }

    /// Returns the first function call, if the model proposed one.
    #[must_use]
    pub fn function_call(&self) -> Option<&FunctionCall> {
        self.parts.iter().find_map(|part| match part {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    /// Concatenates the text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Converts the response into a history entry.
    #[must_use]
    pub fn to_content(&self) -> Content {
        Content::model(self.parts.clone())
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails or its response cannot be read.
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse, LlmError>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
