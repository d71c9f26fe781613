//! Azure OpenAI provider implementation.
//!
//! Adapts Azure OpenAI's Chat Completion and Embedding REST APIs to the
//! crate's [`ChatProvider`]/[`EmbeddingProvider`] interfaces. Every call runs
//! the same sequence: resolve the model's deployment parameters, ask the
//! admission gate for a permit, issue exactly one POST, translate the
//! response. A refused permit aborts before anything touches the network.
//!
//! Wire contract:
//! - Chat: `POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
//! - Embedding: `POST {endpoint}/openai/deployments/{deployment}/embeddings?api-version={version}`
//!
//! Authentication uses the `api-key` header. No streaming, no batching, no
//! retries — transport failures propagate unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, info, instrument, warn};

use crate::admission::{estimate_tokens, AdmissionController, PermissionRequest};
use crate::error::{ProviderError, Result};
use crate::models::{ModelConfig, ModelTable};
use crate::secrets::{ProviderCredentials, SecretStore};
use crate::traits::{
    ChatMessage, ChatProvider, CompletionResult, EmbeddingProvider, EmbeddingResult,
    SamplingOptions, TokenUsage,
};

/// Azure OpenAI adapter.
///
/// Credentials and the model table are resolved once at construction and
/// immutable afterwards, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct AzureProvider {
    client: Client,
    credentials: ProviderCredentials,
    models: ModelTable,
    admission: Arc<dyn AdmissionController>,
}

impl std::fmt::Debug for AzureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureProvider")
            .field("client", &self.client)
            .field("credentials", &self.credentials)
            .field("models", &self.models)
            .field("admission", &"Arc<dyn AdmissionController>")
            .finish()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    n: u8,
}

/// One chat completion choice. Unknown fields are kept for `raw_choices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChoiceMessage,
    #[serde(flatten)]
    extra: Map<String, JsonValue>,
}

/// Message body of a choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChoiceMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(flatten)]
    extra: Map<String, JsonValue>,
}

/// Token usage block. Absent fields are zero, never fatal.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<UsageBody> for TokenUsage {
    fn from(usage: UsageBody) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: UsageBody,
}

/// Embedding request payload.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// One embedding vector.
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding response.
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: UsageBody,
}

/// Error envelope returned by Azure OpenAI.
#[derive(Debug, Deserialize)]
struct AzureErrorResponse {
    error: AzureErrorBody,
}

#[derive(Debug, Deserialize)]
struct AzureErrorBody {
    message: String,
}

// ============================================================================
// AzureProvider Implementation
// ============================================================================

impl AzureProvider {
    /// Provider identifier used for admission requests and the registry.
    pub const PROVIDER_ID: &'static str = "azure";

    /// Create an adapter from already-resolved configuration.
    pub fn new(
        credentials: ProviderCredentials,
        models: ModelTable,
        admission: Arc<dyn AdmissionController>,
    ) -> Self {
        Self {
            client: Client::new(),
            credentials,
            models,
            admission,
        }
    }

    /// Create an adapter by resolving credentials and the model table from
    /// the secret store.
    ///
    /// The secret is read once; a missing `api_key`, `endpoint`, or `models`
    /// entry fails construction with a
    /// [`Config`](crate::error::ProviderError::Config) error.
    pub async fn from_secret_store(
        store: &dyn SecretStore,
        path: &str,
        admission: Arc<dyn AdmissionController>,
    ) -> Result<Self> {
        let secret = store.fetch_secret(path).await?;
        let credentials = ProviderCredentials::from_secret(&secret)?;
        let models_value = secret.get("models").ok_or_else(|| {
            ProviderError::Config("model configurations missing from secret".to_string())
        })?;
        let models = ModelTable::from_value(models_value)?;

        info!(
            endpoint = %credentials.endpoint,
            models = models.len(),
            "initializing Azure OpenAI adapter"
        );

        Ok(Self::new(credentials, models, admission))
    }

    /// The configured model table.
    pub fn models(&self) -> &ModelTable {
        &self.models
    }

    /// API version to use for a model: per-model value, else credential-level.
    fn api_version_for<'a>(&'a self, model: &'a ModelConfig) -> &'a str {
        model
            .api_version
            .as_deref()
            .unwrap_or(&self.credentials.api_version)
    }

    /// Build URL for a deployment operation.
    fn build_url(&self, deployment: &str, operation: &str, api_version: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.credentials.endpoint, deployment, operation, api_version
        )
    }

    /// Ask the gate for a permit; error out on refusal.
    async fn admit(&self, model: &ModelConfig, estimated_tokens: u64) -> Result<()> {
        let request = PermissionRequest::new(Self::PROVIDER_ID, model, estimated_tokens);
        let permit = self.admission.acquire_permit(&request).await?;

        if !permit.is_granted() {
            warn!(
                model = %model.model_name,
                reason = permit.reason().unwrap_or("unspecified"),
                "admission gate refused request"
            );
            return Err(ProviderError::PermissionDenied(
                "permission to perform this request was denied".to_string(),
            ));
        }

        info!(
            model = %model.model_name,
            tokens_expected = permit.tokens_expected().unwrap_or(estimated_tokens),
            "admission gate granted permission"
        );
        Ok(())
    }

    /// Send one POST and decode the response.
    async fn send_request<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.credentials.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<AzureErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to parse response: {e}"))
        })
    }
}

#[async_trait]
impl ChatProvider for AzureProvider {
    fn name(&self) -> &str {
        Self::PROVIDER_ID
    }

    #[instrument(skip(self, history, options), fields(model = %model))]
    async fn generate_response(
        &self,
        model: &str,
        history: &[ChatMessage],
        options: &SamplingOptions,
    ) -> Result<CompletionResult> {
        let model_config = self.models.lookup(model)?;

        let input_chars: usize = history.iter().map(|m| m.content.len()).sum();
        let estimated = estimate_tokens(input_chars, options.max_tokens_or_default());
        self.admit(model_config, estimated).await?;

        let payload = ChatCompletionRequest {
            model: &model_config.deployment_id,
            messages: history,
            temperature: options.temperature_or_default(),
            max_tokens: options.max_tokens_or_default(),
            top_p: options.top_p_or_default(),
            n: options.n_or_default(),
        };
        let url = self.build_url(
            &model_config.deployment_id,
            "chat/completions",
            self.api_version_for(model_config),
        );
        debug!(%url, messages = history.len(), estimated_tokens = estimated, "sending chat request");

        let response: ChatCompletionResponse = match self.send_request(&url, &payload).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "chat completion request failed");
                return Err(e);
            }
        };

        let choice = response.choices.first().ok_or_else(|| {
            let e = ProviderError::MalformedResponse(
                "no choices returned from chat completion".to_string(),
            );
            error!(error = %e, "chat completion response rejected");
            e
        })?;

        let content = choice
            .message
            .content
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                let e =
                    ProviderError::MalformedResponse("no content in first choice".to_string());
                error!(error = %e, "chat completion response rejected");
                e
            })?
            .to_string();

        let usage = TokenUsage::from(response.usage);
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "received chat response"
        );

        let raw_choices = response
            .choices
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CompletionResult {
            content,
            model_used: model_config.deployment_id.clone(),
            request_id: response.id.unwrap_or_else(|| "unknown".to_string()),
            raw_choices,
            usage,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureProvider {
    fn name(&self) -> &str {
        Self::PROVIDER_ID
    }

    #[instrument(skip(self, input), fields(model = %model))]
    async fn generate_embedding(&self, input: &str, model: &str) -> Result<EmbeddingResult> {
        let model_config = self.models.lookup(model)?;

        let estimated = estimate_tokens(input.len(), 0);
        self.admit(model_config, estimated).await?;

        let payload = EmbeddingRequest {
            model: &model_config.deployment_id,
            input,
        };
        let url = self.build_url(
            &model_config.deployment_id,
            "embeddings",
            self.api_version_for(model_config),
        );
        debug!(%url, estimated_tokens = estimated, "sending embedding request");

        let response: EmbeddingResponse = match self.send_request(&url, &payload).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "embedding request failed");
                return Err(e);
            }
        };

        let embedding = response
            .data
            .first()
            .map(|d| d.embedding.clone())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                let e = ProviderError::MalformedResponse(
                    "no embedding returned from embeddings api".to_string(),
                );
                error!(error = %e, "embedding response rejected");
                e
            })?;

        let usage = TokenUsage::from(response.usage);
        info!(
            dimension = embedding.len(),
            prompt_tokens = usage.prompt_tokens,
            "received embedding response"
        );

        Ok(EmbeddingResult {
            embedding,
            model_used: model_config.deployment_id.clone(),
            request_id: response.id.unwrap_or_else(|| "unknown".to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::StaticDecision;
    use serde_json::json;

    fn test_provider() -> AzureProvider {
        let credentials = ProviderCredentials {
            api_key: "test-key".to_string(),
            endpoint: "https://myresource.openai.azure.com".to_string(),
            api_version: "2023-05-15".to_string(),
        };
        let models = ModelTable::from_value(&json!({
            "gpt-4": {
                "deploymentId": "gpt4-dep",
                "apiVersion": "2024-02-01",
                "rpm": 60,
                "tpm": 90000
            },
            "embed-small": {
                "deploymentId": "emb-dep",
                "rpm": 120,
                "tpm": 200000
            }
        }))
        .unwrap();
        AzureProvider::new(credentials, models, Arc::new(StaticDecision::allow()))
    }

    #[test]
    fn test_build_url_chat() {
        let provider = test_provider();
        let url = provider.build_url("gpt4-dep", "chat/completions", "2024-02-01");
        assert_eq!(
            url,
            "https://myresource.openai.azure.com/openai/deployments/gpt4-dep/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_build_url_embeddings() {
        let provider = test_provider();
        let url = provider.build_url("emb-dep", "embeddings", "2023-05-15");
        assert!(url.contains("/openai/deployments/emb-dep/embeddings"));
        assert!(url.contains("api-version=2023-05-15"));
    }

    #[test]
    fn test_api_version_per_model_overrides() {
        let provider = test_provider();
        let model = provider.models().lookup("gpt-4").unwrap();
        assert_eq!(provider.api_version_for(model), "2024-02-01");
    }

    #[test]
    fn test_api_version_falls_back_to_credentials() {
        let provider = test_provider();
        let model = provider.models().lookup("embed-small").unwrap();
        assert_eq!(provider.api_version_for(model), "2023-05-15");
    }

    #[test]
    fn test_chat_payload_defaults() {
        let messages = vec![ChatMessage::user("hi")];
        let options = SamplingOptions::default();
        let payload = ChatCompletionRequest {
            model: "gpt4-dep",
            messages: &messages,
            temperature: options.temperature_or_default(),
            max_tokens: options.max_tokens_or_default(),
            top_p: options.top_p_or_default(),
            n: options.n_or_default(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["model"], "gpt4-dep");
        assert_eq!(value["messages"], json!([{"role": "user", "content": "hi"}]));
        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["max_tokens"], 512);
        assert_eq!(value["top_p"], 1.0);
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_chat_payload_caller_override_wins() {
        let messages = vec![ChatMessage::user("hi")];
        let options = SamplingOptions::with_temperature(0.2);
        let payload = ChatCompletionRequest {
            model: "gpt4-dep",
            messages: &messages,
            temperature: options.temperature_or_default(),
            max_tokens: options.max_tokens_or_default(),
            top_p: options.top_p_or_default(),
            n: options.n_or_default(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["temperature"], 0.2);
        assert_eq!(value["max_tokens"], 512);
        assert_eq!(value["top_p"], 1.0);
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_response_parse_missing_usage_defaults_to_zero() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "abc",
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        }))
        .unwrap();

        let usage = TokenUsage::from(response.usage);
        assert_eq!(usage, TokenUsage::default());
    }

    #[test]
    fn test_response_parse_usage_mapped() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "abc",
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        }))
        .unwrap();

        let usage = TokenUsage::from(response.usage);
        assert_eq!(usage.prompt_tokens, 9);
        assert_eq!(usage.completion_tokens, 12);
        assert_eq!(usage.total_tokens, 21);
    }

    #[test]
    fn test_choice_round_trip_keeps_extra_fields() {
        let choice: ChatChoice = serde_json::from_value(json!({
            "index": 0,
            "message": {"role": "assistant", "content": "hello"},
            "finish_reason": "stop"
        }))
        .unwrap();

        let raw = serde_json::to_value(&choice).unwrap();
        assert_eq!(raw["finish_reason"], "stop");
        assert_eq!(raw["index"], 0);
        assert_eq!(raw["message"]["content"], "hello");
    }

    #[test]
    fn test_embedding_response_parse() {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "id": "xyz",
            "data": [{"embedding": [0.1, 0.2]}]
        }))
        .unwrap();

        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(response.id.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_unknown_model_rejected_before_admission() {
        let admission = Arc::new(StaticDecision::allow());
        let provider = AzureProvider::new(
            ProviderCredentials {
                api_key: "k".to_string(),
                endpoint: "https://x.openai.azure.com".to_string(),
                api_version: "2023-05-15".to_string(),
            },
            ModelTable::default(),
            admission.clone(),
        );

        let err = provider
            .generate_response("gpt-9", &[ChatMessage::user("hi")], &SamplingOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::UnknownModel(_)));
        // The gate is never consulted for an unconfigured model.
        assert_eq!(admission.call_count(), 0);
    }
}
