//! Request admission: permission requests, grants, and the token-bucket
//! controller.
//!
//! Nothing is dispatched to the provider without a granted
//! [`PermissionGrant`]. The gate itself never sleeps and never retries — a
//! refused permit comes back as `granted: false` and the caller decides
//! whether to try again later. Grant metadata (expected token usage, remaining
//! budgets) is surfaced for logging only and must not alter dispatch behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::models::ModelConfig;

/// Rough token estimate for budget accounting: four characters per token,
/// plus the completion budget the caller reserved.
pub fn estimate_tokens(input_chars: usize, completion_budget: u32) -> u64 {
    (input_chars / 4) as u64 + u64::from(completion_budget)
}

/// One outbound request asking the gate for admission.
///
/// Built per call and discarded immediately after the decision.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    /// Provider identifier, e.g. `"azure"`.
    pub provider: String,

    /// Resolved configuration of the model being called.
    pub model: ModelConfig,

    /// Estimated token cost of the request, input plus completion budget.
    pub estimated_tokens: u64,
}

impl PermissionRequest {
    /// Build a request for the given provider and model.
    pub fn new(provider: impl Into<String>, model: &ModelConfig, estimated_tokens: u64) -> Self {
        Self {
            provider: provider.into(),
            model: model.clone(),
            estimated_tokens,
        }
    }
}

/// The gate's decision for one request.
#[derive(Debug, Clone)]
pub struct PermissionGrant {
    /// Whether the request may proceed to dispatch.
    pub granted: bool,

    /// Advisory metadata: at least `tokens_expected` on a grant, a `reason`
    /// on a denial. Logged, never acted on.
    pub metadata: HashMap<String, JsonValue>,
}

impl PermissionGrant {
    /// A grant carrying the expected token usage.
    pub fn granted(tokens_expected: u64) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("tokens_expected".to_string(), json!(tokens_expected));
        Self {
            granted: true,
            metadata,
        }
    }

    /// A denial carrying the reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("reason".to_string(), json!(reason.into()));
        Self {
            granted: false,
            metadata,
        }
    }

    /// Attach an additional metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the request was admitted.
    pub fn is_granted(&self) -> bool {
        self.granted
    }

    /// Expected token usage, when the gate estimated one.
    pub fn tokens_expected(&self) -> Option<u64> {
        self.metadata.get("tokens_expected").and_then(JsonValue::as_u64)
    }

    /// Denial reason, when present.
    pub fn reason(&self) -> Option<&str> {
        self.metadata.get("reason").and_then(JsonValue::as_str)
    }
}

/// Decides whether an outbound request may proceed.
///
/// Implementations must be concurrency-safe; one controller instance is
/// shared across all callers of an adapter.
#[async_trait]
pub trait AdmissionController: Send + Sync {
    /// Request a permit for one outbound call.
    ///
    /// A refusal is a normal `granted: false` result, not an error; `Err` is
    /// reserved for broker failures.
    async fn acquire_permit(&self, request: &PermissionRequest) -> Result<PermissionGrant>;
}

/// Token bucket with continuous refill.
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    fn take(&mut self, tokens: f64) {
        self.tokens = (self.tokens - tokens).max(0.0);
    }

    fn time_to_acquire(&mut self, tokens: f64) -> Duration {
        self.refill();
        if self.tokens >= tokens {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((tokens - self.tokens) / self.refill_rate)
        }
    }
}

/// Per-model request and token buckets.
struct ModelBuckets {
    requests: TokenBucket,
    tokens: TokenBucket,
}

impl ModelBuckets {
    fn for_model(model: &ModelConfig) -> Self {
        let rpm = f64::from(model.requests_per_minute);
        let tpm = f64::from(model.tokens_per_minute);
        Self {
            requests: TokenBucket::new(rpm, rpm / 60.0),
            tokens: TokenBucket::new(tpm, tpm / 60.0),
        }
    }
}

/// In-process [`AdmissionController`] enforcing per-model rpm/tpm budgets.
///
/// Buckets are created lazily from each model's configured budgets and keyed
/// by model name. Both buckets must have capacity for the permit to be
/// granted; neither is debited on a refusal.
#[derive(Default)]
pub struct TokenBucketLimiter {
    buckets: Mutex<HashMap<String, ModelBuckets>>,
}

impl TokenBucketLimiter {
    /// Create a limiter with no buckets yet; they appear on first use.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdmissionController for TokenBucketLimiter {
    async fn acquire_permit(&self, request: &PermissionRequest) -> Result<PermissionGrant> {
        let mut buckets = self.buckets.lock().await;
        let entry = buckets
            .entry(request.model.model_name.clone())
            .or_insert_with(|| ModelBuckets::for_model(&request.model));

        let cost = request.estimated_tokens as f64;
        let requests_available = entry.requests.available();
        let tokens_available = entry.tokens.available();

        if requests_available < 1.0 {
            let wait = entry.requests.time_to_acquire(1.0);
            debug!(
                model = %request.model.model_name,
                wait_ms = wait.as_millis() as u64,
                "admission refused: request budget exhausted"
            );
            return Ok(PermissionGrant::denied("request budget exhausted")
                .with_metadata("retry_after_ms", json!(wait.as_millis() as u64)));
        }

        if tokens_available < cost {
            let wait = entry.tokens.time_to_acquire(cost);
            debug!(
                model = %request.model.model_name,
                estimated_tokens = request.estimated_tokens,
                wait_ms = wait.as_millis() as u64,
                "admission refused: token budget exhausted"
            );
            return Ok(PermissionGrant::denied("token budget exhausted")
                .with_metadata("retry_after_ms", json!(wait.as_millis() as u64)));
        }

        entry.requests.take(1.0);
        entry.tokens.take(cost);

        Ok(PermissionGrant::granted(request.estimated_tokens)
            .with_metadata("requests_remaining", json!(entry.requests.tokens as u64))
            .with_metadata("tokens_remaining", json!(entry.tokens.tokens as u64)))
    }
}

/// Fixed-decision controller for tests: always grant or always deny, with a
/// call counter for never-dispatched assertions.
#[derive(Debug, Default)]
pub struct StaticDecision {
    grant: bool,
    calls: AtomicUsize,
}

impl StaticDecision {
    /// Controller that grants every permit.
    pub fn allow() -> Self {
        Self {
            grant: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Controller that denies every permit.
    pub fn deny() -> Self {
        Self {
            grant: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of permits requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdmissionController for StaticDecision {
    async fn acquire_permit(&self, request: &PermissionRequest) -> Result<PermissionGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.grant {
            Ok(PermissionGrant::granted(request.estimated_tokens))
        } else {
            Ok(PermissionGrant::denied("static denial"))
        }
    }
}
