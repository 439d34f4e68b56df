//! Logging module for jokebot
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` wins when set;
//! otherwise the configured level applies to every target.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Global logging initialization status
static LOG_INIT: OnceLock<()> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level
    pub level: Level,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Whether to include timestamps
    pub include_timestamp: bool,
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            json_format: json_from_env(),
            include_timestamp: true,
        }
    }
}

impl LoggingConfig {
    /// Configuration for a level given on the command line.
    pub fn with_level(level: &str) -> Self {
        Self {
            level: Level::from_env_str(level).unwrap_or(Level::Info),
            ..Self::default()
        }
    }
}

fn json_from_env() -> bool {
    std::env::var("JOKEBOT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false)
}

impl Level {
    /// Parse level from string (for env vars and CLI flags)
    pub fn from_env_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" => Some(Level::Off),
            _ => None,
        }
    }
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LoggingConfig) {
    // Ensure logging is only initialized once
    let _ = LOG_INIT.get_or_init(|| {
        setup_logging(&config);
    });
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
}

fn setup_logging(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt().with_env_filter(build_filter(config));

    // A subscriber installed elsewhere (e.g. by a test harness) takes precedence.
    let _ = if config.json_format {
        builder.json().try_init()
    } else if config.include_timestamp {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Trace => write!(f, "trace"),
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warn => write!(f, "warn"),
            Level::Error => write!(f, "error"),
            Level::Off => write!(f, "off"),
        }
    }
}
