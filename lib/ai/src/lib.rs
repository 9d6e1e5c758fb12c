//! Generative model primitives for pocket-ledger.
//!
//! This crate provides:
//!
//! - **Backend**: the provider-neutral request/response model and `ModelBackend` trait
//! - **Gemini**: a `generateContent` REST backend with function calling
//! - **Retry**: the single-retry policy applied to collaborator calls

pub mod backend;
pub mod error;
pub mod gemini;
pub mod retry;

pub use backend::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest, ModelBackend,
    ModelResponse, Part, Role, TokenUsage,
};
pub use error::LlmError;
pub use gemini::{GeminiBackend, GeminiConfig};
pub use retry::RetryPolicy;
