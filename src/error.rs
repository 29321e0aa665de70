//! Error types for prompt-forge operations.
//!
//! Defines the error types shared across subsystems:
//! - LLM API interactions
//! - Optimizer and provider configuration
//!
//! Engine- and run-level errors live next to the optimizer in
//! [`crate::optimizer::error`].

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: LITELLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Context length exceeded: {limit} tokens")]
    ContextLengthExceeded { limit: u32 },

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

impl LlmError {
    /// Whether the failure came from the network or the provider side and
    /// may succeed when the same request is sent again.
    ///
    /// Misconfiguration (missing credentials, unknown model, oversized
    /// context) and client-side 4xx responses are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(_) | LlmError::RateLimited(_) | LlmError::ParseError(_) => {
                true
            }
            LlmError::ApiError { code, .. } => *code == 408 || *code == 429 || *code >= 500,
            LlmError::MissingApiKey
            | LlmError::MissingApiBase
            | LlmError::InvalidModel(_)
            | LlmError::ContextLengthExceeded { .. } => false,
        }
    }
}

/// Errors that can occur while building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A configuration value could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error while reading configuration files.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RequestFailed("connection reset".to_string()).is_transient());
        assert!(LlmError::RateLimited("slow down".to_string()).is_transient());
        assert!(LlmError::ApiError {
            code: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(LlmError::ApiError {
            code: 429,
            message: "too many".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!LlmError::MissingApiKey.is_transient());
        assert!(!LlmError::InvalidModel("nope".to_string()).is_transient());
        assert!(!LlmError::ContextLengthExceeded { limit: 8192 }.is_transient());
        assert!(!LlmError::ApiError {
            code: 400,
            message: "bad request".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "PROMPT_FORGE_THRESHOLD".to_string(),
            message: "could not parse 'high'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for PROMPT_FORGE_THRESHOLD: could not parse 'high'"
        );
    }
}
