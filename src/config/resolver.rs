//! Layered configuration resolution.
//!
//! Every field resolves on its own: environment, then persisted override,
//! then default. Writes only ever reach the persisted layer.

use std::sync::Arc;

use super::{ChatConfig, ChatConfigBuilder, OverrideStore, ResponseStyle};
use crate::errors::AnythingLlmResult;

/// One of the five user-facing configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// Backend base URL.
    BaseUrl,
    /// API key.
    ApiKey,
    /// Workspace slug.
    Workspace,
    /// Response style.
    ResponseStyle,
    /// Citation toggle.
    Citations,
}

impl ConfigField {
    /// All fields, in display order.
    pub const ALL: [ConfigField; 5] = [
        ConfigField::BaseUrl,
        ConfigField::ApiKey,
        ConfigField::Workspace,
        ConfigField::ResponseStyle,
        ConfigField::Citations,
    ];

    /// Environment variable that provides this field.
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigField::BaseUrl => "ANYTHINGLLM_BASE_URL",
            ConfigField::ApiKey => "ANYTHINGLLM_API_KEY",
            ConfigField::Workspace => "ANYTHINGLLM_WORKSPACE",
            ConfigField::ResponseStyle => "ANYTHINGLLM_RESPONSE_STYLE",
            ConfigField::Citations => "ANYTHINGLLM_CITATIONS",
        }
    }

    /// Key under which the user override is persisted.
    pub fn persisted_key(&self) -> &'static str {
        match self {
            ConfigField::BaseUrl => "finbox_anythingllm_url",
            ConfigField::ApiKey => "finbox_anythingllm_key",
            ConfigField::Workspace => "finbox_anythingllm_workspace",
            ConfigField::ResponseStyle => "finbox_response_style",
            ConfigField::Citations => "finbox_citations",
        }
    }
}

/// Where the effective value of a field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Injected by the environment; not editable from the UI.
    Environment,
    /// Set by the user and persisted.
    Persisted,
    /// Hard-coded default.
    Default,
}

/// A partial configuration from a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Backend base URL.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Workspace slug.
    pub workspace: Option<String>,
    /// Response style.
    pub response_style: Option<ResponseStyle>,
    /// Citation toggle.
    pub citations: Option<bool>,
}

impl ConfigLayer {
    /// Reads the environment layer from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|field| std::env::var(field.env_var()).ok())
    }

    /// Reads the persisted layer from an override store.
    pub fn from_store(store: &dyn OverrideStore) -> AnythingLlmResult<Self> {
        let mut values = Vec::with_capacity(ConfigField::ALL.len());
        for field in ConfigField::ALL {
            values.push((field, store.get(field.persisted_key())?));
        }
        Ok(Self::from_lookup(|field| {
            values
                .iter()
                .find(|(f, _)| *f == field)
                .and_then(|(_, v)| v.clone())
        }))
    }

    /// Builds a layer from a per-field lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(ConfigField) -> Option<String>,
    {
        let get = |field: ConfigField| {
            lookup(field)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let response_style = get(ConfigField::ResponseStyle).and_then(|v| match v.parse() {
            Ok(style) => Some(style),
            Err(e) => {
                tracing::warn!(value = %v, error = %e, "Ignoring invalid response style");
                None
            }
        });

        let citations = get(ConfigField::Citations).and_then(|v| {
            let parsed = parse_bool(&v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "Ignoring invalid citations flag");
            }
            parsed
        });

        Self {
            base_url: get(ConfigField::BaseUrl),
            api_key: get(ConfigField::ApiKey),
            workspace: get(ConfigField::Workspace),
            response_style,
            citations,
        }
    }

    /// Field-wise merge: values in `self` win, gaps are filled from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            base_url: self.base_url.or(lower.base_url),
            api_key: self.api_key.or(lower.api_key),
            workspace: self.workspace.or(lower.workspace),
            response_style: self.response_style.or(lower.response_style),
            citations: self.citations.or(lower.citations),
        }
    }

    /// Returns true if this layer provides `field`.
    pub fn has(&self, field: ConfigField) -> bool {
        match field {
            ConfigField::BaseUrl => self.base_url.is_some(),
            ConfigField::ApiKey => self.api_key.is_some(),
            ConfigField::Workspace => self.workspace.is_some(),
            ConfigField::ResponseStyle => self.response_style.is_some(),
            ConfigField::Citations => self.citations.is_some(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Produces the effective `ChatConfig` from environment, persisted
/// overrides and defaults.
pub struct ConfigResolver {
    env: ConfigLayer,
    store: Arc<dyn OverrideStore>,
}

impl ConfigResolver {
    /// Creates a resolver over an explicit environment layer.
    pub fn new(env: ConfigLayer, store: Arc<dyn OverrideStore>) -> Self {
        Self { env, store }
    }

    /// Creates a resolver that reads the process environment once.
    pub fn from_env(store: Arc<dyn OverrideStore>) -> Self {
        Self::new(ConfigLayer::from_env(), store)
    }

    /// Returns the environment layer.
    pub fn env_layer(&self) -> &ConfigLayer {
        &self.env
    }

    /// Resolves the effective configuration.
    pub fn resolve(&self) -> AnythingLlmResult<ChatConfig> {
        let persisted = ConfigLayer::from_store(self.store.as_ref())?;
        let merged = self.env.clone().or(persisted);
        ChatConfigBuilder::new().layer(merged).build()
    }

    /// Reports which layer currently provides `field`.
    pub fn source_of(&self, field: ConfigField) -> AnythingLlmResult<ConfigSource> {
        if self.env.has(field) {
            return Ok(ConfigSource::Environment);
        }
        let persisted = ConfigLayer::from_store(self.store.as_ref())?;
        if persisted.has(field) {
            Ok(ConfigSource::Persisted)
        } else {
            Ok(ConfigSource::Default)
        }
    }

    /// Persists a user override for `field`.
    ///
    /// If the environment also provides the field, the write is kept but has
    /// no effect until the environment value goes away.
    pub fn set(&self, field: ConfigField, value: &str) -> AnythingLlmResult<()> {
        if field == ConfigField::ResponseStyle {
            value.parse::<ResponseStyle>()?;
        }
        if self.env.has(field) {
            tracing::debug!(
                field = field.persisted_key(),
                "Environment value shadows persisted override"
            );
        }
        self.store.set(field.persisted_key(), value.trim())
    }

    /// Persists the base URL override.
    pub fn set_base_url(&self, base_url: &str) -> AnythingLlmResult<()> {
        self.set(ConfigField::BaseUrl, base_url)
    }

    /// Persists the API key override.
    pub fn set_api_key(&self, api_key: &str) -> AnythingLlmResult<()> {
        self.set(ConfigField::ApiKey, api_key)
    }

    /// Persists the workspace override.
    pub fn set_workspace(&self, workspace: &str) -> AnythingLlmResult<()> {
        self.set(ConfigField::Workspace, workspace)
    }

    /// Persists the response style override.
    pub fn set_response_style(&self, style: ResponseStyle) -> AnythingLlmResult<()> {
        self.set(ConfigField::ResponseStyle, style.as_str())
    }

    /// Persists the citations override.
    pub fn set_citations(&self, citations: bool) -> AnythingLlmResult<()> {
        self.set(ConfigField::Citations, if citations { "true" } else { "false" })
    }

    /// Removes the persisted override for `field`.
    pub fn clear(&self, field: ConfigField) -> AnythingLlmResult<()> {
        self.store.remove(field.persisted_key())
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("env_fields", &ConfigField::ALL.iter().filter(|f| self.env.has(**f)).count())
            .finish()
    }
}
