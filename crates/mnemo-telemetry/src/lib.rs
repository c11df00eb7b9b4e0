//! # mnemo-telemetry
//!
//! Tracing subscriber setup for the hub binary.
//!
//! - `dev`: human-readable console output at debug level
//! - `prod`: JSON lines at info level
//!
//! `RUST_LOG` overrides either default.

use std::fmt;

use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty console output, debug level.
    #[default]
    Dev,
    /// JSON lines, info level.
    Prod,
}

impl LogFormat {
    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_directive(self) -> &'static str {
        match self {
            Self::Dev => "debug",
            Self::Prod => "info",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => f.write_str("dev"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Output profile.
    pub format: LogFormat,
    /// Deployment environment, attached to the startup record.
    pub env_name: String,
    /// Service name, attached to the startup record.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Dev,
            env_name: "dev".into(),
            service_name: "mnemo".into(),
        }
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Default filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

fn build_filter(format: LogFormat) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(format.default_directive())?),
    }
}

/// Initialize the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config.format)?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Dev => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Prod => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    info!(
        env = %config.env_name,
        service = %config.service_name,
        format = %config.format,
        "telemetry initialized"
    );
    Ok(())
}

/// Render `fields` as an aligned tree, one line per entry.
pub fn config_tree(fields: &[(&str, String)]) -> Vec<String> {
    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 3;
    let last = fields.len().saturating_sub(1);

    fields
        .iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let prefix = if i == last { "└─" } else { "├─" };
            format!("{prefix} {key:<width$}{value}")
        })
        .collect()
}

/// Log the effective configuration at debug level.
pub fn log_config(fields: &[(&str, String)]) {
    info!("config");
    for line in config_tree(fields) {
        debug!("{line}");
    }
}
