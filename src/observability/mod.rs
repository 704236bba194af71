//! Observability for the AnythingLLM client.
//!
//! Structured logging goes through `tracing`; [`LogConfig::init`] installs
//! the subscriber. The [`Observability`] facade bundles a redacting
//! [`Logger`] and a [`MetricsCollector`] that the services record into.

mod logging;
mod metrics;

pub use logging::{
    init_tracing, redact, ConsoleLogger, LogConfig, LogFormat, LogLevel, Logger, NoopLogger,
};
pub use metrics::{ChatMetrics, DefaultMetricsCollector, MetricsCollector};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Configuration of the console logger.
    pub logging: LogConfig,
    /// Enable metrics collection.
    pub enable_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging: LogConfig::default().level(LogLevel::Warn),
            enable_metrics: true,
        }
    }
}

/// Observability facade shared by the services.
#[derive(Clone)]
pub struct Observability {
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn MetricsCollector>,
    config: ObservabilityConfig,
}

impl Observability {
    /// Creates a facade with a console logger and in-memory metrics.
    pub fn new(config: ObservabilityConfig) -> Self {
        Self {
            logger: Arc::new(ConsoleLogger::new(config.logging.clone())),
            metrics: Arc::new(DefaultMetricsCollector::new()),
            config,
        }
    }

    /// Creates a facade that logs nothing but still counts.
    pub fn silent() -> Self {
        Self::with_components(
            Arc::new(NoopLogger),
            Arc::new(DefaultMetricsCollector::new()),
            ObservabilityConfig::default(),
        )
    }

    /// Creates with custom logger and metrics collector.
    pub fn with_components(
        logger: Arc<dyn Logger>,
        metrics: Arc<dyn MetricsCollector>,
        config: ObservabilityConfig,
    ) -> Self {
        Self {
            logger,
            metrics,
            config,
        }
    }

    /// Returns the logger.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Records a successful request.
    pub fn record_success(&self, timer: &RequestTimer) {
        if self.config.enable_metrics {
            self.metrics
                .record_request(timer.operation(), true, timer.elapsed());
        }
    }

    /// Records a failed request and logs the error kind.
    pub fn record_failure(&self, timer: &RequestTimer, error: &crate::errors::AnythingLlmError) {
        if self.config.enable_metrics {
            self.metrics
                .record_request(timer.operation(), false, timer.elapsed());
            self.metrics.record_error(error.kind());
        }
        self.logger
            .warn(&format!("{} failed: {}", timer.operation(), error));
    }

    /// Records deltas delivered to a consumer.
    pub fn record_deltas(&self, count: u64) {
        if self.config.enable_metrics && count > 0 {
            self.metrics.record_deltas(count);
        }
    }

    /// Records a cancelled stream.
    pub fn record_cancellation(&self, timer: &RequestTimer) {
        if self.config.enable_metrics {
            self.metrics
                .record_request(timer.operation(), true, timer.elapsed());
            self.metrics.record_cancellation();
        }
    }

    /// Records frames skipped by the parser.
    pub fn record_skipped_frames(&self, count: u64) {
        if self.config.enable_metrics && count > 0 {
            self.metrics.record_skipped_frames(count);
        }
    }
}

impl Default for Observability {
    fn default() -> Self {
        Self::new(ObservabilityConfig::default())
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("config", &self.config)
            .finish()
    }
}

/// Measures the duration of one operation.
#[derive(Debug)]
pub struct RequestTimer {
    start: Instant,
    operation: &'static str,
}

impl RequestTimer {
    /// Starts timing `operation`.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}
