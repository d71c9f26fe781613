//! Provider error types.
//!
//! Every failure in this crate surfaces as a [`ProviderError`] variant; nothing
//! is swallowed or silently downgraded. The crate itself never retries —
//! [`ProviderError::is_retryable`] is an advisory classification for callers
//! (or an external broker) that implement their own backoff policy.
//!
//! | Error | Cause | Caller action |
//! |-------|-------|---------------|
//! | `Config` | Missing credential or model table at setup | Fix the secret, restart |
//! | `UnknownModel` | Model name absent from the table | Choose a configured model |
//! | `PermissionDenied` | Admission gate refused the request | Retry later, if at all |
//! | `Transport` | Network/HTTP failure | Retry per own policy |
//! | `Api` | Provider returned a non-success status | Inspect status |
//! | `MalformedResponse` | Provider response missing a required field | Do not retry |

use thiserror::Error;

/// Result type for all adapter operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced by the adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or invalid configuration at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Requested model has no entry in the model table.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The admission gate refused the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transport-layer failure, propagated unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider returned a non-success HTTP status.
    #[error("provider error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Decoded provider error message, or the raw body when undecodable.
        message: String,
    },

    /// Provider response is missing a required field.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether a caller could reasonably retry the failed request later.
    ///
    /// Transient transport failures, server-side errors, and admission
    /// denials are retryable from the caller's point of view. Configuration
    /// problems, unknown models, and shape mismatches are not — repeating
    /// the request cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::PermissionDenied(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Config(_)
            | Self::UnknownModel(_)
            | Self::MalformedResponse(_)
            | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_config() {
        let err = ProviderError::Config("api_key missing".to_string());
        assert_eq!(err.to_string(), "configuration error: api_key missing");
    }

    #[test]
    fn test_display_unknown_model() {
        let err = ProviderError::UnknownModel("gpt-9".to_string());
        assert_eq!(err.to_string(), "unknown model: gpt-9");
    }

    #[test]
    fn test_display_permission_denied() {
        let err = ProviderError::PermissionDenied("request budget exhausted".to_string());
        assert_eq!(
            err.to_string(),
            "permission denied: request budget exhausted"
        );
    }

    #[test]
    fn test_display_api_error() {
        let err = ProviderError::Api {
            status: 429,
            message: "rate limit".to_string(),
        };
        assert_eq!(err.to_string(), "provider error (429): rate limit");
    }

    #[test]
    fn test_display_malformed() {
        let err = ProviderError::MalformedResponse("no choices returned".to_string());
        assert_eq!(err.to_string(), "malformed response: no choices returned");
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: ProviderError = json_err.into();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_permission_denied_is_retryable() {
        assert!(ProviderError::PermissionDenied("denied".to_string()).is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = ProviderError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());

        let err = ProviderError::Api {
            status: 429,
            message: "too many requests".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = ProviderError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        assert!(!ProviderError::Config("missing".to_string()).is_retryable());
        assert!(!ProviderError::UnknownModel("x".to_string()).is_retryable());
        assert!(!ProviderError::MalformedResponse("y".to_string()).is_retryable());
    }
}
