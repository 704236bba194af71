//! Configuration module for the AnythingLLM client.
//!
//! `ChatConfig` is the effective configuration every service reads.
//! It is produced by [`ConfigResolver`], which layers environment values
//! over persisted user overrides over the defaults defined here.

mod resolver;
mod store;

pub use resolver::{ConfigField, ConfigLayer, ConfigResolver, ConfigSource};
pub use store::{JsonFileStore, MemoryStore, OverrideStore};

#[cfg(test)]
pub use store::MockOverrideStore;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{AnythingLlmError, AnythingLlmResult};

/// Default base URL of a locally hosted AnythingLLM instance.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Default workspace slug.
pub const DEFAULT_WORKSPACE: &str = "finbox";

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for connection probes (5 seconds).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum retry attempts for idempotent requests.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// How verbose the assistant's answers should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseStyle {
    /// Short, to-the-point answers.
    Concise,
    /// Full explanations.
    #[default]
    Detailed,
    /// Numbered step-by-step instructions.
    StepByStep,
}

impl ResponseStyle {
    /// Returns the persisted/environment string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Concise => "concise",
            ResponseStyle::Detailed => "detailed",
            ResponseStyle::StepByStep => "step-by-step",
        }
    }
}

impl fmt::Display for ResponseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStyle {
    type Err = AnythingLlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concise" => Ok(ResponseStyle::Concise),
            "detailed" => Ok(ResponseStyle::Detailed),
            "step-by-step" | "step_by_step" | "stepbystep" => Ok(ResponseStyle::StepByStep),
            other => Err(AnythingLlmError::validation_param(
                format!("Unknown response style '{}'", other),
                "response_style",
            )),
        }
    }
}

/// Effective configuration for talking to AnythingLLM.
#[derive(Clone)]
pub struct ChatConfig {
    /// API key (may be empty while the assistant is unconfigured).
    pub(crate) api_key: SecretString,
    /// Base URL of the backend, without trailing slash.
    pub base_url: String,
    /// Workspace slug chats are sent to.
    pub workspace: String,
    /// Answer style used in the system prompt.
    pub response_style: ResponseStyle,
    /// Whether answers should cite their sources.
    pub citations: bool,
    /// Request timeout for non-streaming calls and stream connection.
    pub timeout: Duration,
    /// Timeout for connection probes.
    pub probe_timeout: Duration,
    /// Maximum retry attempts for idempotent requests.
    pub max_retries: u32,
}

impl ChatConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::new()
    }

    /// Returns the API key (exposing the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns true when an API key is present.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// Returns true when both API key and workspace are set.
    pub fn is_configured(&self) -> bool {
        self.has_api_key() && !self.workspace.trim().is_empty()
    }

    /// Fails with a configuration error unless [`is_configured`](Self::is_configured).
    pub fn ensure_configured(&self) -> AnythingLlmResult<()> {
        if !self.has_api_key() {
            return Err(AnythingLlmError::configuration("no API key configured"));
        }
        if self.workspace.trim().is_empty() {
            return Err(AnythingLlmError::configuration("no workspace configured"));
        }
        Ok(())
    }

    /// Returns the API key hint (last 4 characters) for debugging.
    pub fn api_key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        let count = key.chars().count();
        if count > 4 {
            format!("...{}", key.chars().skip(count - 4).collect::<String>())
        } else {
            "****".to_string()
        }
    }

    /// Returns the full URL for an endpoint.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(String::new()),
            base_url: DEFAULT_BASE_URL.to_string(),
            workspace: DEFAULT_WORKSPACE.to_string(),
            response_style: ResponseStyle::default(),
            citations: true,
            timeout: DEFAULT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("workspace", &self.workspace)
            .field("response_style", &self.response_style)
            .field("citations", &self.citations)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for `ChatConfig`.
#[derive(Default)]
pub struct ChatConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    workspace: Option<String>,
    response_style: Option<ResponseStyle>,
    citations: Option<bool>,
    timeout: Option<Duration>,
    probe_timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl ChatConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the workspace slug.
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Sets the response style.
    pub fn response_style(mut self, style: ResponseStyle) -> Self {
        self.response_style = Some(style);
        self
    }

    /// Enables or disables source citations.
    pub fn citations(mut self, citations: bool) -> Self {
        self.citations = Some(citations);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Applies every field present in a resolved layer.
    pub(crate) fn layer(mut self, layer: ConfigLayer) -> Self {
        if let Some(v) = layer.base_url {
            self.base_url = Some(v);
        }
        if let Some(v) = layer.api_key {
            self.api_key = Some(v);
        }
        if let Some(v) = layer.workspace {
            self.workspace = Some(v);
        }
        if let Some(v) = layer.response_style {
            self.response_style = Some(v);
        }
        if let Some(v) = layer.citations {
            self.citations = Some(v);
        }
        self
    }

    /// Builds the configuration.
    ///
    /// A missing API key is not an error here: an unconfigured assistant is a
    /// valid state, reported by the services at call time.
    pub fn build(self) -> AnythingLlmResult<ChatConfig> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let parsed = url::Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AnythingLlmError::configuration(format!(
                "Base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let api_key = self.api_key.unwrap_or_default().trim().to_string();

        Ok(ChatConfig {
            api_key: SecretString::new(api_key),
            base_url,
            workspace: self
                .workspace
                .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string())
                .trim()
                .to_string(),
            response_style: self.response_style.unwrap_or_default(),
            citations: self.citations.unwrap_or(true),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            probe_timeout: self.probe_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}
