//! Logging configuration and utilities.
//!
//! [`LogConfig::init`] installs the global `tracing` subscriber. The
//! [`Logger`] trait is a small sink for messages that may contain user
//! input or credentials; [`ConsoleLogger`] scrubs those before printing.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Trace level.
    Trace = 0,
    /// Debug level.
    Debug = 1,
    /// Info level.
    #[default]
    Info = 2,
    /// Warning level.
    Warn = 3,
    /// Error level.
    Error = 4,
    /// Off (no logging).
    Off = 5,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Off => "OFF",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, colored output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line output.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Subscriber output format.
    pub format: LogFormat,
    /// Include timestamps.
    pub include_timestamps: bool,
    /// Include the module target.
    pub include_target: bool,
    /// Include file and line number.
    pub include_file_line: bool,
    /// Redact API keys and bearer tokens.
    pub redact_sensitive: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_timestamps: true,
            include_target: true,
            include_file_line: false,
            redact_sensitive: true,
        }
    }
}

impl LogConfig {
    /// Creates a new log configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to include file and line number.
    pub fn file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Disables sensitive data redaction.
    pub fn no_redact(mut self) -> Self {
        self.redact_sensitive = false;
        self
    }

    /// Installs the global tracing subscriber.
    ///
    /// `RUST_LOG` directives are honoured on top of the configured level.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init(&self) -> Result<(), tracing_subscriber::util::TryInitError> {
        let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from(self.level).into());
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(self.include_target))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init(),
        }
    }
}

/// Installs the global tracing subscriber for `config`.
pub fn init_tracing(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    config.init()
}

fn redaction_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"Bearer\s+[A-Za-z0-9._~+/=-]+", "Bearer ***"),
            // AnythingLLM developer keys: four dash-separated groups of seven.
            (r"\b[A-Z0-9]{7}-[A-Z0-9]{7}-[A-Z0-9]{7}-[A-Z0-9]{7}\b", "***"),
            (r#"(?i)(api[_-]?key|authorization)(["']?\s*[=:]\s*["']?)[^\s,"'}]+"#, "${1}${2}***"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Removes bearer tokens and API keys from `text`.
pub fn redact(text: &str) -> String {
    redaction_patterns()
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Logger interface.
pub trait Logger: Send + Sync {
    /// Logs a message at the specified level.
    fn log(&self, level: LogLevel, message: &str, context: Option<&HashMap<String, String>>);

    /// Logs at debug level.
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    /// Logs at info level.
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    /// Logs at warning level.
    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    /// Logs at error level.
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None);
    }
}

/// Logger that writes redacted lines to stdout/stderr.
#[derive(Debug)]
pub struct ConsoleLogger {
    config: LogConfig,
}

impl ConsoleLogger {
    /// Creates a new console logger.
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// Formats a log line without printing it.
    pub fn format_line(
        &self,
        level: LogLevel,
        message: &str,
        context: Option<&HashMap<String, String>>,
    ) -> Option<String> {
        if level < self.config.level || level == LogLevel::Off {
            return None;
        }

        let mut parts = Vec::new();

        if self.config.include_timestamps {
            parts.push(format!("[{}]", chrono::Utc::now().to_rfc3339()));
        }
        parts.push(format!("[{}]", level.label()));
        parts.push(self.scrub(message));

        if let Some(ctx) = context {
            // Sorted so lines are stable across runs.
            let fields: std::collections::BTreeMap<&str, String> = ctx
                .iter()
                .map(|(k, v)| {
                    let sensitive = ["key", "token", "auth"].iter().any(|s| k.contains(s));
                    let v = if self.config.redact_sensitive && sensitive {
                        "***".to_string()
                    } else {
                        self.scrub(v)
                    };
                    (k.as_str(), v)
                })
                .collect();

            if let Ok(json) = serde_json::to_string(&fields) {
                parts.push(json);
            }
        }

        Some(parts.join(" "))
    }

    fn scrub(&self, text: &str) -> String {
        if self.config.redact_sensitive {
            redact(text)
        } else {
            text.to_string()
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str, context: Option<&HashMap<String, String>>) {
        let Some(line) = self.format_line(level, message, context) else {
            return;
        };

        match level {
            LogLevel::Warn | LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Logger that discards all messages.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: Option<&HashMap<String, String>>) {}
}
