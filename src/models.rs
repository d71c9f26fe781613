//! Logical-model to deployment mapping.
//!
//! Azure serves models through named deployments, so the application's model
//! names ("gpt-4", "embed-small") have to be translated into provider-side
//! parameters before every call. The table is built once from the provider
//! secret and never mutated; lookups are pure.
//!
//! Expected table shape (JSON object, or a JSON string encoding one):
//!
//! ```json
//! {
//!   "gpt-4": { "deploymentId": "gpt4-dep", "apiVersion": "2023-05-15",
//!              "rpm": 60, "tpm": 90000 }
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ProviderError, Result};

/// Deployment parameters for one logical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Logical model name, filled from the table key.
    #[serde(skip)]
    pub model_name: String,

    /// Azure deployment id the model is provisioned under.
    pub deployment_id: String,

    /// Per-model API version. Falls back to the credential-level version
    /// when absent.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Request-per-minute budget for the admission gate.
    #[serde(rename = "rpm")]
    pub requests_per_minute: u32,

    /// Token-per-minute budget for the admission gate.
    #[serde(rename = "tpm")]
    pub tokens_per_minute: u32,
}

/// Immutable lookup table from logical model name to [`ModelConfig`].
#[derive(Debug, Clone, Default)]
pub struct ModelTable {
    models: HashMap<String, ModelConfig>,
}

impl ModelTable {
    /// Build a table from the secret's `models` value.
    ///
    /// Accepts either a JSON object or a JSON string encoding one — some
    /// secret stores flatten nested structures to strings.
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let parsed;
        let table = match value {
            JsonValue::String(raw) => {
                parsed = serde_json::from_str::<JsonValue>(raw).map_err(|e| {
                    ProviderError::Config(format!("model table is not valid JSON: {e}"))
                })?;
                &parsed
            }
            other => other,
        };

        let entries = table.as_object().ok_or_else(|| {
            ProviderError::Config("model table must be a JSON object".to_string())
        })?;

        let mut models = HashMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let mut config: ModelConfig =
                serde_json::from_value(entry.clone()).map_err(|e| {
                    ProviderError::Config(format!(
                        "invalid model configuration for '{name}': {e}"
                    ))
                })?;
            config.model_name = name.clone();
            models.insert(name.clone(), config);
        }

        Ok(Self { models })
    }

    /// Look up the configuration for a logical model name.
    pub fn lookup(&self, model: &str) -> Result<&ModelConfig> {
        self.models
            .get(model)
            .ok_or_else(|| ProviderError::UnknownModel(model.to_string()))
    }

    /// Whether a model is configured.
    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Configured model names, in arbitrary order.
    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Number of configured models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
