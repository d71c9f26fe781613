//! Mock chat and embedding provider for testing.
//!
//! Queue-based and deterministic: responses are popped in insertion order,
//! and a canned default is returned when the queue is empty. Call counters
//! back the "denied permit means no dispatch" style of assertion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::traits::{
    ChatMessage, ChatProvider, CompletionResult, EmbeddingProvider, EmbeddingResult,
    SamplingOptions, TokenUsage,
};

/// Deterministic provider double.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    embeddings: Arc<Mutex<Vec<Vec<f32>>>>,
    chat_calls: Arc<AtomicUsize>,
    embedding_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a mock with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chat response.
    pub async fn add_response(&self, response: impl Into<String>) {
        self.responses.lock().await.push(response.into());
    }

    /// Queue an embedding.
    pub async fn add_embedding(&self, embedding: Vec<f32>) {
        self.embeddings.lock().await.push(embedding);
    }

    /// Number of chat calls served.
    pub fn chat_call_count(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Number of embedding calls served.
    pub fn embedding_call_count(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_response(
        &self,
        model: &str,
        _history: &[ChatMessage],
        _options: &SamplingOptions,
    ) -> Result<CompletionResult> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);

        let mut responses = self.responses.lock().await;
        let content = if responses.is_empty() {
            "mock response".to_string()
        } else {
            responses.remove(0)
        };

        Ok(CompletionResult {
            content,
            model_used: model.to_string(),
            request_id: "mock-request".to_string(),
            raw_choices: Vec::new(),
            usage: TokenUsage::default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_embedding(&self, _input: &str, model: &str) -> Result<EmbeddingResult> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);

        let mut embeddings = self.embeddings.lock().await;
        let embedding = if embeddings.is_empty() {
            vec![0.1; 1536]
        } else {
            embeddings.remove(0)
        };

        Ok(EmbeddingResult {
            embedding,
            model_used: model.to_string(),
            request_id: "mock-request".to_string(),
            usage: TokenUsage::default(),
        })
    }
}
