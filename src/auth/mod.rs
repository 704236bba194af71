//! Authentication for AnythingLLM's developer API.
//!
//! Every request except the unauthenticated availability probe carries
//! `Authorization: Bearer {api_key}`.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::errors::AnythingLlmError;

/// Authentication provider trait.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials before any request is sent.
    fn validate(&self) -> Result<(), AnythingLlmError>;
}

/// Bearer API key authentication.
pub struct ApiKeyAuth {
    api_key: SecretString,
}

impl ApiKeyAuth {
    /// Creates a new API key authentication provider.
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    /// Creates from a string API key.
    pub fn from_string(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
        }
    }

    /// Gets a hint of the API key for debugging (last 4 characters).
    pub fn key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        let count = key.chars().count();
        if count > 4 {
            format!("...{}", key.chars().skip(count - 4).collect::<String>())
        } else {
            "****".to_string()
        }
    }
}

impl AuthProvider for ApiKeyAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key.expose_secret()),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), AnythingLlmError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(AnythingLlmError::configuration("no API key configured"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &"[REDACTED]")
            .field("key_hint", &self.key_hint())
            .finish()
    }
}
