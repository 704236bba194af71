//! Error types for the AnythingLLM client.
//!
//! Covers every failure mode the client can hit against the RAG backend:
//! configuration, authentication, server status, network reachability and
//! stream problems. Frame-level parse failures are recovered inside the
//! stream parser and never become an error value.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for AnythingLLM operations.
pub type AnythingLlmResult<T> = Result<T, AnythingLlmError>;

/// Error type for AnythingLLM client operations.
#[derive(Debug, Error)]
pub enum AnythingLlmError {
    /// Configuration error (missing API key, missing workspace, bad URL).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Authentication or authorization failure (401/403).
    #[error("Authentication failed (HTTP {status_code}): {message}")]
    Authentication {
        /// Error message from the backend.
        message: String,
        /// HTTP status code (401 or 403).
        status_code: u16,
        /// Hint about the API key (last 4 chars).
        api_key_hint: Option<String>,
    },

    /// Requested resource does not exist (unknown workspace slug).
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
        /// HTTP status code, when the backend answered 404.
        status_code: Option<u16>,
    },

    /// Any other non-2xx status.
    #[error("Server error (HTTP {status_code}): {message}")]
    Server {
        /// Error message.
        message: String,
        /// HTTP status code.
        status_code: u16,
    },

    /// Network/connection error; the backend could not be reached.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Underlying cause.
        cause: Option<String>,
    },

    /// Timeout error.
    #[error("Request timeout after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The backend answered with an empty body where a stream was expected.
    #[error("Backend returned no response stream")]
    EmptyStream,

    /// The byte stream broke off mid-read.
    #[error("Stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
        /// Content delivered before the failure.
        partial_content: Option<String>,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Request validation failed before anything was sent.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },
}

impl AnythingLlmError {
    /// Returns true if this error is worth retrying for idempotent requests.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnythingLlmError::Server { status_code: 500..=504, .. }
                | AnythingLlmError::Timeout { .. }
                | AnythingLlmError::Network { .. }
        )
    }

    /// Returns the short kind label used by metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnythingLlmError::Configuration { .. } => "configuration",
            AnythingLlmError::Authentication { .. } => "authentication",
            AnythingLlmError::NotFound { .. } => "not_found",
            AnythingLlmError::Server { .. } => "server",
            AnythingLlmError::Network { .. } => "network",
            AnythingLlmError::Timeout { .. } => "timeout",
            AnythingLlmError::EmptyStream => "empty_stream",
            AnythingLlmError::Stream { .. } => "stream",
            AnythingLlmError::Serialization { .. } => "serialization",
            AnythingLlmError::Validation { .. } => "validation",
        }
    }

    /// Renders the single human-readable message shown to the advisor.
    ///
    /// `base_url` is the configured backend URL, named in reachability
    /// errors so the user can check it.
    pub fn user_message(&self, base_url: &str) -> String {
        match self {
            AnythingLlmError::Configuration { message } => format!(
                "AnythingLLM is not configured: {}. Add an API key and workspace in the settings.",
                message
            ),
            AnythingLlmError::Authentication { status_code, .. } => format!(
                "Invalid API key (HTTP {}). Generate a new key in AnythingLLM under Settings > API Keys.",
                status_code
            ),
            AnythingLlmError::NotFound {
                message,
                status_code: Some(status_code),
            } => format!(
                "AnythingLLM resource not found (HTTP {}): {}",
                status_code, message
            ),
            AnythingLlmError::NotFound { message, .. } => {
                format!("AnythingLLM resource not found: {}", message)
            }
            AnythingLlmError::Server { status_code, .. } => {
                format!("AnythingLLM server error (HTTP {}).", status_code)
            }
            AnythingLlmError::Network { .. } => format!(
                "AnythingLLM is not reachable at {}. Is the backend running?",
                base_url
            ),
            AnythingLlmError::Timeout { timeout } => format!(
                "AnythingLLM at {} did not answer within {}s.",
                base_url,
                timeout.as_secs()
            ),
            AnythingLlmError::EmptyStream => "AnythingLLM returned no response stream.".to_string(),
            AnythingLlmError::Stream { message, .. } => {
                format!("The response stream was interrupted: {}", message)
            }
            AnythingLlmError::Serialization { message } => {
                format!("Unexpected response from AnythingLLM: {}", message)
            }
            AnythingLlmError::Validation { message, .. } => message.clone(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        AnythingLlmError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error with parameter.
    pub fn validation_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        AnythingLlmError::Validation {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates an error from a non-2xx status code.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => AnythingLlmError::Authentication {
                message,
                status_code,
                api_key_hint: None,
            },
            404 => AnythingLlmError::NotFound {
                message,
                status_code: Some(status_code),
            },
            _ => AnythingLlmError::Server {
                message,
                status_code,
            },
        }
    }
}

/// Error body returned by AnythingLLM's developer API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Error message, present on most failures.
    #[serde(default)]
    pub error: Option<String>,
    /// Some endpoints answer `{"message": "..."}` instead.
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorResponse {
    /// Returns whichever message field the backend filled in.
    pub fn text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

impl From<reqwest::Error> for AnythingLlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnythingLlmError::Timeout {
                timeout: crate::config::DEFAULT_TIMEOUT,
            }
        } else if err.is_connect() || err.is_request() {
            AnythingLlmError::Network {
                message: err.to_string(),
                cause: None,
            }
        } else if let Some(status) = err.status() {
            AnythingLlmError::from_status(status.as_u16(), err.to_string())
        } else {
            AnythingLlmError::Stream {
                message: err.to_string(),
                partial_content: None,
            }
        }
    }
}

impl From<serde_json::Error> for AnythingLlmError {
    fn from(err: serde_json::Error) -> Self {
        AnythingLlmError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for AnythingLlmError {
    fn from(err: url::ParseError) -> Self {
        AnythingLlmError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
