//! Capability traits and neutral result types.
//!
//! The adapter exposes two capability interfaces, [`ChatProvider`] and
//! [`EmbeddingProvider`], so callers depend on what a provider can do rather
//! than on a concrete client type. Results are immutable value objects in the
//! application's own shape — the provider's wire format never leaks past the
//! translator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System message for setting context.
    System,
    /// User input message.
    User,
    /// Assistant response message.
    Assistant,
}

/// A message in a chat conversation.
///
/// Owned by the caller; the adapter only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: ChatRole,

    /// Content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for chat completion requests.
///
/// Every field is optional; unset fields fall back to the documented
/// defaults below. Caller-supplied values always win over defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Sampling temperature. Defaults to [`Self::DEFAULT_TEMPERATURE`].
    pub temperature: Option<f64>,

    /// Maximum tokens to generate. Defaults to [`Self::DEFAULT_MAX_TOKENS`].
    pub max_tokens: Option<u32>,

    /// Nucleus sampling cutoff. Defaults to [`Self::DEFAULT_TOP_P`].
    pub top_p: Option<f64>,

    /// Number of completions to request. Defaults to [`Self::DEFAULT_N`].
    pub n: Option<u8>,
}

impl SamplingOptions {
    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    /// Default completion token budget.
    pub const DEFAULT_MAX_TOKENS: u32 = 512;
    /// Default nucleus sampling cutoff.
    pub const DEFAULT_TOP_P: f64 = 1.0;
    /// Default number of completions.
    pub const DEFAULT_N: u8 = 1;

    /// Create options with a specific temperature.
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    /// Effective temperature after applying the default.
    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE)
    }

    /// Effective completion token budget after applying the default.
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS)
    }

    /// Effective nucleus cutoff after applying the default.
    pub fn top_p_or_default(&self) -> f64 {
        self.top_p.unwrap_or(Self::DEFAULT_TOP_P)
    }

    /// Effective completion count after applying the default.
    pub fn n_or_default(&self) -> u8 {
        self.n.unwrap_or(Self::DEFAULT_N)
    }
}

/// Token accounting reported by the provider.
///
/// Absent usage fields are zero, never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,

    /// Tokens generated in the completion.
    pub completion_tokens: u32,

    /// Total tokens billed for the request.
    pub total_tokens: u32,
}

/// Result of a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Generated text of the first choice.
    pub content: String,

    /// Deployment the request was served by.
    pub model_used: String,

    /// Provider request id, or `"unknown"` when not reported.
    pub request_id: String,

    /// Unmapped provider choices, kept for callers that inspect alternatives.
    pub raw_choices: Vec<JsonValue>,

    /// Token accounting for the request.
    pub usage: TokenUsage,
}

/// Result of an embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// Embedding vector for the input.
    pub embedding: Vec<f32>,

    /// Deployment the request was served by.
    pub model_used: String,

    /// Provider request id, or `"unknown"` when not reported.
    pub request_id: String,

    /// Token accounting for the request.
    pub usage: TokenUsage,
}

/// Trait for providers that generate chat completions.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable identifier of this provider.
    fn name(&self) -> &str;

    /// Generate a completion for the given conversation.
    ///
    /// `model` is the logical model name; the provider resolves it to its
    /// own deployment parameters. The call admits through the provider's
    /// gate before anything is dispatched.
    async fn generate_response(
        &self,
        model: &str,
        history: &[ChatMessage],
        options: &SamplingOptions,
    ) -> Result<CompletionResult>;
}

/// Trait for providers that generate embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier of this provider.
    fn name(&self) -> &str;

    /// Generate an embedding for the given input.
    async fn generate_embedding(&self, input: &str, model: &str) -> Result<EmbeddingResult>;
}
