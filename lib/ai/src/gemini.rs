//! Gemini `generateContent` backend.
//!
//! Speaks the REST wire format directly. Wire types are kept private so the
//! rest of the workspace only sees the neutral types from [`crate::backend`].

use crate::backend::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest, ModelBackend,
    ModelResponse, Part, Role, TokenUsage,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, instrument};

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

const PROVIDER: &str = "gemini";

/// Connection settings for [`GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as the `key` query parameter.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a configuration for the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gemini REST client.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Creates a backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "Gemini API key is empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    #[instrument(skip(self, request), fields(model = %self.config.model, contents = request.contents.len()))]
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse, LlmError> {
        let body = WireRequest::from_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let detail = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after_secs, &detail));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;
        let parsed = wire.into_model_response(&self.config.model)?;
        debug!(
            parts = parsed.parts.len(),
            tokens = parsed.usage.total(),
            "model responded"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_connect() {
        LlmError::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            reason: e.to_string(),
        }
    }
}

fn map_status(status: StatusCode, retry_after_secs: Option<u64>, detail: &str) -> LlmError {
    let detail: String = detail.chars().take(200).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited { retry_after_secs }
    } else if status.is_server_error() {
        LlmError::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {status}: {detail}"),
        }
    } else if status == StatusCode::BAD_REQUEST || status == StatusCode::FORBIDDEN {
        // rejected request or key; repeating it will not help
        LlmError::InvalidConfig {
            reason: format!("HTTP {status}: {detail}"),
        }
    } else {
        LlmError::RequestFailed {
            reason: format!("HTTP {status}: {detail}"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![WireTool {
                function_declarations: &request.tools,
            }]
        };
        Self {
            contents: request.contents.iter().map(WireContent::from).collect(),
            tools,
            generation_config: request
                .temperature
                .map(|temperature| WireGenerationConfig { temperature }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

impl From<&Content> for WireContent {
    fn from(content: &Content) -> Self {
        let role = match content.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: content.parts.iter().map(WirePart::from).collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                ..Self::default()
            },
            Part::FunctionCall(call) => Self {
                function_call: Some(WireFunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                ..Self::default()
            },
            Part::FunctionResponse(result) => {
                // the API only accepts an object here
                let response = match &result.response {
                    JsonValue::Object(_) => result.response.clone(),
                    other => serde_json::json!({ "result": other }),
                };
                Self {
                    function_response: Some(WireFunctionResponse {
                        name: result.name.clone(),
                        response,
                    }),
                    ..Self::default()
                }
            }
        }
    }
}

impl WirePart {
    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            return Some(Part::FunctionCall(FunctionCall::new(call.name, call.args)));
        }
        if let Some(result) = self.function_response {
            return Some(Part::FunctionResponse(FunctionResponse {
                name: result.name,
                response: result.response,
            }));
        }
        self.text.map(Part::Text)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: JsonMap<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl WireResponse {
    fn into_model_response(self, requested_model: &str) -> Result<ModelResponse, LlmError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(LlmError::ResponseParseFailed {
                reason: "response contained no candidates".to_string(),
            });
        };
        let parts: Vec<Part> = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(WirePart::into_part)
            .collect();
        if parts.is_empty() {
            return Err(LlmError::ResponseParseFailed {
                reason: format!(
                    "candidate had no content (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }
        let usage = self.usage_metadata.unwrap_or_default();
        Ok(ModelResponse {
            parts,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
            model: self
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}
