//! AnythingLLM client.
//!
//! Wires configuration, transport, authentication and observability into
//! the services.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::{ChatConfig, ChatConfigBuilder, ConfigResolver, MemoryStore, ResponseStyle};
use crate::errors::{AnythingLlmError, AnythingLlmResult};
use crate::observability::{
    ConsoleLogger, DefaultMetricsCollector, LogConfig, Logger, MetricsCollector, Observability,
    ObservabilityConfig,
};
use crate::panel::ChatPanel;
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::services::{ChatService, ConnectionProber, DocumentsService, WorkspacesService};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::document::DocumentUpload;
use crate::types::workspace::{UpdateEmbeddingsRequest, Workspace};

/// Client for a local AnythingLLM backend.
///
/// # Example
///
/// ```rust,no_run
/// use anythingllm_client::{AnythingLlmClient, StreamCallbacks};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AnythingLlmClient::builder()
///         .api_key("ABC1234-DEF5678-GHI9012-JKL3456")
///         .workspace("finbox")
///         .build()?;
///
///     let mut handler = StreamCallbacks::new(
///         |delta: &str| print!("{delta}"),
///         || println!(),
///         |message: &str| eprintln!("{message}"),
///     );
///     client
///         .chat()
///         .stream_chat("Which documents do I need for a claim?", "/claims", &CancellationToken::new(), &mut handler)
///         .await;
///     Ok(())
/// }
/// ```
pub struct AnythingLlmClient {
    config: Arc<ChatConfig>,
    chat_service: ChatService,
    prober: ConnectionProber,
    workspaces_service: WorkspacesService,
    documents_service: DocumentsService,
    observability: Observability,
}

impl AnythingLlmClient {
    /// Creates a new client builder.
    pub fn builder() -> AnythingLlmClientBuilder {
        AnythingLlmClientBuilder::new()
    }

    /// Creates a client from `ANYTHINGLLM_*` environment variables alone.
    pub fn from_env() -> AnythingLlmResult<Self> {
        let resolver = ConfigResolver::from_env(Arc::new(MemoryStore::new()));
        Self::from_resolver(&resolver)
    }

    /// Creates a client from the effective configuration of `resolver`.
    pub fn from_resolver(resolver: &ConfigResolver) -> AnythingLlmResult<Self> {
        AnythingLlmClientBuilder::from_config(resolver.resolve()?).build()
    }

    /// Returns the chat service.
    pub fn chat(&self) -> &ChatService {
        &self.chat_service
    }

    /// Returns the connection prober.
    pub fn prober(&self) -> &ConnectionProber {
        &self.prober
    }

    /// Returns the workspaces service.
    pub fn workspaces(&self) -> &WorkspacesService {
        &self.workspaces_service
    }

    /// Returns the documents service.
    pub fn documents(&self) -> &DocumentsService {
        &self.documents_service
    }

    /// Creates a chat panel with its own session.
    pub fn panel(&self) -> ChatPanel {
        ChatPanel::new(&self.chat_service)
    }

    /// Uploads a document and embeds it into the workspace `slug`.
    pub async fn upload_to_workspace(
        &self,
        slug: &str,
        upload: DocumentUpload,
    ) -> AnythingLlmResult<Workspace> {
        let uploaded = self.documents_service.upload(upload).await?;
        if !uploaded.success || uploaded.documents.is_empty() {
            return Err(AnythingLlmError::Server {
                message: uploaded
                    .error
                    .unwrap_or_else(|| "document was not stored".to_string()),
                status_code: 422,
            });
        }

        let request = uploaded
            .locations()
            .into_iter()
            .fold(UpdateEmbeddingsRequest::default(), UpdateEmbeddingsRequest::add);
        self.workspaces_service.update_embeddings(slug, &request).await
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the observability facade.
    pub fn observability(&self) -> &Observability {
        &self.observability
    }
}

impl std::fmt::Debug for AnythingLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnythingLlmClient")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for the AnythingLLM client.
pub struct AnythingLlmClientBuilder {
    config_builder: ChatConfigBuilder,
    config: Option<ChatConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    retry_config: Option<RetryConfig>,
    logger: Option<Arc<dyn Logger>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    observability_config: ObservabilityConfig,
}

impl AnythingLlmClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: ChatConfigBuilder::new(),
            config: None,
            transport: None,
            auth: None,
            retry_config: None,
            logger: None,
            metrics: None,
            observability_config: ObservabilityConfig::default(),
        }
    }

    /// Creates a builder from an already resolved configuration.
    ///
    /// Individual config setters are ignored when a full configuration is
    /// given.
    pub fn from_config(config: ChatConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::new()
        }
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_key(api_key);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the workspace slug.
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.workspace(workspace);
        self
    }

    /// Sets the response style.
    pub fn response_style(mut self, style: ResponseStyle) -> Self {
        self.config_builder = self.config_builder.response_style(style);
        self
    }

    /// Enables or disables source citations.
    pub fn citations(mut self, citations: bool) -> Self {
        self.config_builder = self.config_builder.citations(citations);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.probe_timeout(timeout);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the retry configuration for idempotent requests.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Sets a custom logger.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the console logger configuration.
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.observability_config.logging = config;
        self
    }

    /// Builds the client.
    ///
    /// A missing API key is allowed; chats then fail with a configuration
    /// error and probes report the backend as unconfigured.
    pub fn build(self) -> AnythingLlmResult<AnythingLlmClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };
        let config = Arc::new(config);

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.timeout).map_err(|e| {
                    AnythingLlmError::configuration(format!("failed to create HTTP client: {}", e))
                })?,
            ),
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(a) => a,
            None => Arc::new(ApiKeyAuth::from_string(config.api_key())),
        };

        let logger: Arc<dyn Logger> = self.logger.unwrap_or_else(|| {
            Arc::new(ConsoleLogger::new(self.observability_config.logging.clone()))
        });
        let metrics: Arc<dyn MetricsCollector> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));
        let observability =
            Observability::with_components(logger, metrics, self.observability_config);

        let retry = RetryPolicy::new(
            self.retry_config
                .unwrap_or_else(|| RetryConfig::from_chat_config(&config)),
        );

        let chat_service = ChatService::new(
            Arc::clone(&transport),
            Arc::clone(&auth),
            Arc::clone(&config),
            observability.clone(),
        );
        let prober = ConnectionProber::new(
            Arc::clone(&transport),
            Arc::clone(&auth),
            Arc::clone(&config),
            observability.clone(),
        );
        let workspaces_service =
            WorkspacesService::new(Arc::clone(&transport), Arc::clone(&auth), retry);
        let documents_service = DocumentsService::new(transport, auth, Arc::clone(&config));

        tracing::debug!(
            base_url = %config.base_url,
            workspace = %config.workspace,
            configured = config.is_configured(),
            "AnythingLLM client ready"
        );

        Ok(AnythingLlmClient {
            config,
            chat_service,
            prober,
            workspaces_service,
            documents_service,
            observability,
        })
    }
}

impl Default for AnythingLlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
