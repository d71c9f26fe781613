//! Secret-store access and credential resolution.
//!
//! Credentials are fetched from the secret store exactly once, at adapter
//! construction, and validated eagerly: a missing `api_key` or `endpoint` is
//! a fatal [`Config`](crate::error::ProviderError::Config) error surfaced to
//! the caller before any request can be made. The resulting
//! [`ProviderCredentials`] is immutable and safe to share across concurrent
//! callers.
//!
//! The secret store is authoritative — environment-variable sourcing of
//! provider credentials is deliberately not supported.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use crate::error::{ProviderError, Result};

/// Fallback API version applied when the secret does not pin one.
pub const DEFAULT_API_VERSION: &str = "2023-05-15";

/// Read access to a secret store.
///
/// The store is treated as synchronous and authoritative at construction
/// time; implementations fetch one secret as a flat key/value mapping.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret at `path` as a key/value mapping.
    async fn fetch_secret(&self, path: &str) -> Result<Map<String, JsonValue>>;
}

/// HashiCorp Vault KV v2 client.
///
/// Reads `GET {addr}/v1/{path}` with the `X-Vault-Token` header and unwraps
/// the KV v2 `data.data` envelope. Paths use standard KV v2 addressing, e.g.
/// `secret/data/azure`.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    addr: String,
    token: String,
}

impl VaultClient {
    /// Create a client for the given Vault address and token.
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            addr: addr.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Create a client from `VAULT_ADDR` and `VAULT_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let addr = std::env::var("VAULT_ADDR")
            .map_err(|_| ProviderError::Config("VAULT_ADDR not set".to_string()))?;
        let token = std::env::var("VAULT_TOKEN")
            .map_err(|_| ProviderError::Config("VAULT_TOKEN not set".to_string()))?;
        Ok(Self::new(addr, token))
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn fetch_secret(&self, path: &str) -> Result<Map<String, JsonValue>> {
        let url = format!("{}/v1/{}", self.addr, path.trim_start_matches('/'));
        debug!(%url, "fetching secret");

        let response = self
            .http
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!("secret store read of '{path}' failed: {body}"),
            });
        }

        let envelope: JsonValue = serde_json::from_str(&body).map_err(|e| {
            ProviderError::Config(format!("secret at '{path}' is not valid JSON: {e}"))
        })?;

        // KV v2 wraps the payload twice: response.data.data.
        envelope
            .get("data")
            .and_then(|d| d.get("data"))
            .and_then(JsonValue::as_object)
            .cloned()
            .ok_or_else(|| {
                ProviderError::Config(format!(
                    "secret at '{path}' has no data.data mapping (is it KV v2?)"
                ))
            })
    }
}

/// Immutable provider credentials resolved from a secret.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// API key sent in the `api-key` request header.
    pub api_key: String,

    /// Provider endpoint, without trailing slash.
    pub endpoint: String,

    /// Credential-level API version; per-model versions override it.
    pub api_version: String,
}

impl ProviderCredentials {
    /// Validate and extract credentials from a fetched secret.
    ///
    /// `api_key` and `endpoint` are required; `api_version` falls back to
    /// [`DEFAULT_API_VERSION`].
    pub fn from_secret(secret: &Map<String, JsonValue>) -> Result<Self> {
        let api_key = secret
            .get("api_key")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| ProviderError::Config("Azure API key not set in secret".to_string()))?;

        let endpoint = secret
            .get("endpoint")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                ProviderError::Config("Azure API endpoint not set in secret".to_string())
            })?;

        let api_version = secret
            .get("api_version")
            .and_then(JsonValue::as_str)
            .unwrap_or(DEFAULT_API_VERSION);

        Ok(Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_credentials_from_complete_secret() {
        let creds = ProviderCredentials::from_secret(&secret(json!({
            "api_key": "k",
            "endpoint": "https://res.openai.azure.com",
            "api_version": "2024-02-01"
        })))
        .unwrap();

        assert_eq!(creds.api_key, "k");
        assert_eq!(creds.endpoint, "https://res.openai.azure.com");
        assert_eq!(creds.api_version, "2024-02-01");
    }

    #[test]
    fn test_api_version_fallback() {
        let creds = ProviderCredentials::from_secret(&secret(json!({
            "api_key": "k",
            "endpoint": "https://res.openai.azure.com"
        })))
        .unwrap();

        assert_eq!(creds.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = ProviderCredentials::from_secret(&secret(json!({
            "endpoint": "https://res.openai.azure.com"
        })))
        .unwrap_err();

        match err {
            ProviderError::Config(msg) => assert!(msg.contains("API key")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_endpoint_fails() {
        let err = ProviderCredentials::from_secret(&secret(json!({ "api_key": "k" })))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let creds = ProviderCredentials::from_secret(&secret(json!({
            "api_key": "k",
            "endpoint": "https://res.openai.azure.com/"
        })))
        .unwrap();

        assert_eq!(creds.endpoint, "https://res.openai.azure.com");
    }

    #[test]
    fn test_vault_client_trims_addr() {
        let client = VaultClient::new("http://vault:8200/", "tok");
        assert_eq!(client.addr, "http://vault:8200");
    }
}
