//! Tracing subscriber setup.
//!
//! [`TracingOptions`] describes the subscriber the kernel installs when it
//! boots. Installation uses `try_init`, so a subscriber installed earlier by
//! the host application (or by another kernel) is left untouched.
//!
//! # Example
//!
//! ```
//! use trellis_kernel::{LogFormat, TracingOptions};
//! use tracing::Level;
//!
//! // Development: pretty output with span enter/exit events
//! let dev = TracingOptions::new()
//!     .with_level(Level::DEBUG)
//!     .with_span_events(true);
//!
//! // Production: JSON output, container internals kept quiet
//! let prod = TracingOptions::new()
//!     .with_format(LogFormat::Json)
//!     .with_env_filter("info,trellis_container=warn");
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// LogFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration installed by [`Kernel::boot`](crate::Kernel::boot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingOptions {
    /// Maximum log level, used when no filter is given.
    level: Level,
    /// Output format.
    format: LogFormat,
    /// Filter directives (e.g., "`trellis_container=trace,info`").
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingOptions {
    /// Creates options with the default settings: `INFO`, pretty, no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives.
    ///
    /// Format: `target=level,target=level,...`. An unparsable filter falls
    /// back to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the maximum log level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the output format.
    #[must_use]
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Returns the filter directives, if any.
    #[must_use]
    pub fn env_filter(&self) -> Option<&str> {
        self.env_filter.as_deref()
    }

    /// Installs the global subscriber.
    ///
    /// Returns `false` if a global subscriber was already installed.
    pub fn install(&self) -> bool {
        let env_filter = match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        };

        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = match self.format {
            LogFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            LogFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        if installed {
            tracing::info!(level = %self.level, format = ?self.format, "tracing initialized");
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_info_and_pretty() {
        let options = TracingOptions::default();
        assert_eq!(options.level(), Level::INFO);
        assert_eq!(options.format(), LogFormat::Pretty);
        assert_eq!(options.env_filter(), None);
    }

    #[test]
    fn builders_set_fields() {
        let options = TracingOptions::new()
            .with_level(Level::TRACE)
            .with_format(LogFormat::Compact)
            .with_env_filter("trellis_container=trace")
            .with_span_events(true);
        assert_eq!(options.level(), Level::TRACE);
        assert_eq!(options.format(), LogFormat::Compact);
        assert_eq!(options.env_filter(), Some("trellis_container=trace"));
        assert!(options.span_events);
    }

    #[test]
    fn log_format_reads_lowercase_names() {
        let format: LogFormat = serde_json::from_value(serde_json::json!("json")).unwrap();
        assert_eq!(format, LogFormat::Json);
        assert!(serde_json::from_value::<LogFormat>(serde_json::json!("xml")).is_err());
    }

    #[test]
    fn second_install_is_ignored() {
        let options = TracingOptions::new().with_format(LogFormat::Compact);
        options.install();
        assert!(!options.install());
    }
}
