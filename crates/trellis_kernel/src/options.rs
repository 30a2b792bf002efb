//! Kernel options and environment lookup.

use tracing::Level;

use crate::logging::{LogFormat, TracingOptions};

/// Environment variable naming the deployment environment.
pub const ENV_VAR: &str = "TRELLIS_ENV";
/// Environment variable enabling debug mode (`1`, `true`, `yes`, `on`).
pub const DEBUG_VAR: &str = "TRELLIS_DEBUG";
/// Environment variable holding tracing filter directives.
pub const LOG_VAR: &str = "TRELLIS_LOG";
/// Environment variable selecting the log format (`pretty`, `compact`, `json`).
pub const LOG_FORMAT_VAR: &str = "TRELLIS_LOG_FORMAT";

/// Environment used when none is configured.
pub const DEFAULT_ENV: &str = "development";

/// Options for a [`Kernel`](crate::Kernel).
///
/// # Example
///
/// ```
/// use trellis_kernel::{KernelOptions, TracingOptions};
///
/// let options = KernelOptions::new()
///     .with_env("test")
///     .with_tracing(TracingOptions::new().with_env_filter("warn"));
/// assert_eq!(options.env(), "test");
/// assert!(!options.is_debug());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOptions {
    env: String,
    debug: bool,
    tracing: Option<TracingOptions>,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV.to_string(),
            debug: false,
            tracing: None,
        }
    }
}

impl KernelOptions {
    /// Creates options for the default environment, without tracing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads options from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads options through `lookup`.
    ///
    /// - [`ENV_VAR`] sets the environment.
    /// - [`DEBUG_VAR`] enables debug mode.
    /// - [`LOG_VAR`] and [`LOG_FORMAT_VAR`] enable tracing with the given
    ///   filter and format. Debug mode alone enables tracing at `DEBUG`.
    ///
    /// Unrecognized values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(env) = lookup(ENV_VAR).filter(|env| !env.is_empty()) {
            options.env = env;
        }
        options.debug = lookup(DEBUG_VAR).is_some_and(|value| is_truthy(&value));

        let filter = lookup(LOG_VAR).filter(|filter| !filter.is_empty());
        let format = lookup(LOG_FORMAT_VAR).and_then(|format| {
            serde_json::from_value::<LogFormat>(serde_json::Value::String(format.to_lowercase()))
                .ok()
        });

        if filter.is_some() || format.is_some() || options.debug {
            let mut logging = TracingOptions::new();
            if options.debug {
                logging = logging.with_level(Level::DEBUG);
            }
            if let Some(filter) = filter {
                logging = logging.with_env_filter(filter);
            }
            if let Some(format) = format {
                logging = logging.with_format(format);
            }
            options.tracing = Some(logging);
        }

        options
    }

    /// Sets the environment plugins are filtered against.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Installs `tracing` when the kernel boots.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingOptions) -> Self {
        self.tracing = Some(tracing);
        self
    }

    /// Returns the environment.
    #[must_use]
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Returns whether debug mode is on.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns the tracing configuration, if any.
    #[must_use]
    pub fn tracing(&self) -> Option<&TracingOptions> {
        self.tracing.as_ref()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let options = KernelOptions::from_lookup(lookup(&[]));
        assert_eq!(options, KernelOptions::default());
        assert_eq!(options.env(), DEFAULT_ENV);
        assert!(options.tracing().is_none());
    }

    #[test]
    fn env_and_debug_are_read() {
        let options = KernelOptions::from_lookup(lookup(&[
            (ENV_VAR, "production"),
            (DEBUG_VAR, "TRUE"),
        ]));
        assert_eq!(options.env(), "production");
        assert!(options.is_debug());
        assert_eq!(options.tracing().map(TracingOptions::level), Some(Level::DEBUG));
    }

    #[test]
    fn log_variables_enable_tracing() {
        let options = KernelOptions::from_lookup(lookup(&[
            (LOG_VAR, "trellis_container=trace"),
            (LOG_FORMAT_VAR, "JSON"),
        ]));
        let logging = options.tracing().unwrap();
        assert_eq!(logging.env_filter(), Some("trellis_container=trace"));
        assert_eq!(logging.format(), LogFormat::Json);
        assert_eq!(logging.level(), Level::INFO);
    }

    #[test]
    fn unrecognized_values_are_ignored() {
        let options = KernelOptions::from_lookup(lookup(&[
            (DEBUG_VAR, "maybe"),
            (LOG_FORMAT_VAR, "xml"),
            (ENV_VAR, ""),
        ]));
        assert_eq!(options, KernelOptions::default());
    }
}
