//! Error types for the splitflap content pipeline.

use thiserror::Error;

/// Classified upstream failure kinds. The failover coordinator branches only on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailureKind {
    RateLimit,
    Authentication,
    InvalidRequest,
    Timeout,
}

/// Pipeline errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Provider rate limit exceeded ({provider}, status {status}): {message}")]
    ProviderRateLimit {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Provider authentication failed ({provider}, status {status}): {message}")]
    ProviderAuthFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Provider rejected request ({provider}, status {status}): {message}")]
    ProviderInvalidRequest {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Provider request timed out ({provider}) after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Content rejected after {attempts} attempts: {last_error}")]
    ValidationExhausted { attempts: usize, last_error: String },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("No eligible content source registered")]
    NoEligibleSource,

    #[error("Content source already registered: {0}")]
    DuplicateSource(String),

    #[error("Unknown content source: {0}")]
    UnknownSource(String),

    #[error("Layout-mode content from '{0}' carried no grid")]
    MissingLayout(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Display delivery failed: {0}")]
    DeliveryFailed(String),
}

impl ApiError {
    /// Upstream failure classification, if this error is one the failover handles.
    pub fn failure_kind(&self) -> Option<ProviderFailureKind> {
        match self {
            ApiError::ProviderRateLimit { .. } => Some(ProviderFailureKind::RateLimit),
            ApiError::ProviderAuthFailed { .. } => Some(ProviderFailureKind::Authentication),
            ApiError::ProviderInvalidRequest { .. } => Some(ProviderFailureKind::InvalidRequest),
            ApiError::ProviderTimeout { .. } => Some(ProviderFailureKind::Timeout),
            _ => None,
        }
    }

    /// Wiring bugs: fatal for the cycle and surfaced to operators.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ApiError::NoEligibleSource
                | ApiError::DuplicateSource(_)
                | ApiError::UnknownSource(_)
                | ApiError::MissingLayout(_)
                | ApiError::InvalidLayout(_)
                | ApiError::ConfigError(_)
        )
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        let rate = ApiError::ProviderRateLimit {
            provider: "openai".to_string(),
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(rate.failure_kind(), Some(ProviderFailureKind::RateLimit));

        let timeout = ApiError::ProviderTimeout {
            provider: "openai".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(timeout.failure_kind(), Some(ProviderFailureKind::Timeout));

        let exhausted = ApiError::ValidationExhausted {
            attempts: 3,
            last_error: "too long".to_string(),
        };
        assert_eq!(exhausted.failure_kind(), None);
        assert!(!exhausted.is_configuration_error());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(ApiError::NoEligibleSource.is_configuration_error());
        assert!(ApiError::MissingLayout("clock".to_string()).is_configuration_error());
        assert!(!ApiError::DeliveryFailed("offline".to_string()).is_configuration_error());
    }
}
