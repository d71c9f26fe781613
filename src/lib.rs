//! quotagate-llm — admission-controlled provider adapter for Azure OpenAI.
//!
//! This crate adapts Azure OpenAI's Chat Completion and Embedding REST APIs
//! to neutral [`ChatProvider`]/[`EmbeddingProvider`] interfaces, with every
//! outbound request gated by a rate-limit admission protocol.
//!
//! # Request flow
//!
//! ```text
//! caller ──► ModelTable::lookup ──► AdmissionController::acquire_permit
//!                                        │
//!                          denied ◄──────┴──────► granted
//!                            │                       │
//!                 PermissionDenied            one POST to Azure
//!                                                    │
//!                                      translate ──► CompletionResult /
//!                                                    EmbeddingResult
//! ```
//!
//! # Guarantees
//!
//! - Credentials are resolved from the secret store once per adapter and are
//!   immutable afterwards; a missing field fails construction.
//! - No request reaches the network without a granted permit.
//! - One outbound call per invocation: no retries, no streaming, no batching.
//! - Provider wire shapes never leak: a malformed response is a typed error,
//!   absent usage counts are zeros.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quotagate_llm::{
//!     AzureProvider, ChatMessage, SamplingOptions, TokenBucketLimiter, VaultClient,
//! };
//!
//! let vault = VaultClient::from_env()?;
//! let gate = Arc::new(TokenBucketLimiter::new());
//! let azure = AzureProvider::from_secret_store(&vault, "secret/data/azure", gate).await?;
//!
//! let history = vec![ChatMessage::user("hi")];
//! let result = azure
//!     .generate_response("gpt-4", &history, &SamplingOptions::default())
//!     .await?;
//! println!("{}", result.content);
//! ```

pub mod admission;
pub mod error;
pub mod models;
pub mod providers;
pub mod registry;
pub mod secrets;
pub mod traits;

pub use admission::{
    estimate_tokens, AdmissionController, PermissionGrant, PermissionRequest, StaticDecision,
    TokenBucketLimiter,
};
pub use error::{ProviderError, Result};
pub use models::{ModelConfig, ModelTable};
pub use providers::azure::AzureProvider;
pub use providers::mock::MockProvider;
pub use registry::ProviderRegistry;
pub use secrets::{ProviderCredentials, SecretStore, VaultClient, DEFAULT_API_VERSION};
pub use traits::{
    ChatMessage, ChatProvider, ChatRole, CompletionResult, EmbeddingProvider, EmbeddingResult,
    SamplingOptions, TokenUsage,
};
