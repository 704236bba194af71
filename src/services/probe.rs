//! Connection prober.

use std::fmt;
use std::sync::Arc;
use tracing::instrument;

use crate::auth::AuthProvider;
use crate::config::ChatConfig;
use crate::errors::AnythingLlmError;
use crate::observability::{Observability, RequestTimer};
use crate::transport::{HttpRequest, HttpTransport};

const AUTH_PATH: &str = "api/v1/auth";

/// Backend state as seen by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The backend answered and accepted the key.
    Online,
    /// The backend could not be reached or is failing.
    Offline,
    /// No usable API key: none is set, or the backend rejected it.
    Unconfigured,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Online => "online",
            ConnectionState::Offline => "offline",
            ConnectionState::Unconfigured => "unconfigured",
        })
    }
}

/// Result of a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Classified state.
    pub state: ConnectionState,
    /// True only for [`ConnectionState::Online`].
    pub ok: bool,
    /// Human-readable description.
    pub message: String,
}

impl ConnectionStatus {
    fn online(message: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Online,
            ok: true,
            message: message.into(),
        }
    }

    fn no_key() -> Self {
        Self {
            state: ConnectionState::Unconfigured,
            ok: false,
            message: "no key".to_string(),
        }
    }

    fn from_error(err: &AnythingLlmError, base_url: &str) -> Self {
        let state = match err {
            AnythingLlmError::Authentication { .. } | AnythingLlmError::Configuration { .. } => {
                ConnectionState::Unconfigured
            }
            _ => ConnectionState::Offline,
        };
        Self {
            state,
            ok: false,
            message: err.user_message(base_url),
        }
    }
}

/// Classifies backend reachability without side effects.
#[derive(Clone)]
pub struct ConnectionProber {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<ChatConfig>,
    observability: Observability,
}

impl ConnectionProber {
    /// Creates a new prober.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<ChatConfig>,
        observability: Observability,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            observability,
        }
    }

    /// Sends one authenticated request and classifies the answer.
    ///
    /// Without an API key no request is made. The request is bounded by
    /// the configured probe timeout and never retried.
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    pub async fn probe(&self) -> ConnectionStatus {
        if !self.config.has_api_key() {
            tracing::debug!("Skipping probe, no API key configured");
            return ConnectionStatus::no_key();
        }

        let timer = RequestTimer::start("probe");
        let mut request = HttpRequest::get(AUTH_PATH).with_timeout(self.config.probe_timeout);
        self.auth.apply_auth(&mut request.headers);

        let result = match self.transport.send(request).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(super::error_from_response(&response)),
            Err(err) => Err(AnythingLlmError::from(err)),
        };

        match result {
            Ok(()) => {
                self.observability.record_success(&timer);
                ConnectionStatus::online(format!("Connected to AnythingLLM at {}", self.config.base_url))
            }
            Err(err) => {
                self.observability.record_failure(&timer, &err);
                let status = ConnectionStatus::from_error(&err, &self.config.base_url);
                tracing::info!(state = %status.state, "Probe failed");
                status
            }
        }
    }

    /// Checks whether anything answers at the base URL, without credentials.
    ///
    /// Any HTTP status counts as reachable; only transport failures report
    /// [`ConnectionState::Offline`].
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    pub async fn check_availability(&self) -> ConnectionStatus {
        let request = HttpRequest::get(AUTH_PATH).with_timeout(self.config.probe_timeout);

        match self.transport.send(request).await {
            Ok(response) => ConnectionStatus::online(format!(
                "AnythingLLM answered at {} (HTTP {})",
                self.config.base_url, response.status
            )),
            Err(err) => {
                ConnectionStatus::from_error(&AnythingLlmError::from(err), &self.config.base_url)
            }
        }
    }
}

impl fmt::Debug for ConnectionProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProber")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}
