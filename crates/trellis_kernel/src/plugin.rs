//! Plugins: namespaced bundles of service registrations.
//!
//! A plugin owns one configuration namespace. When the kernel boots, the
//! plugin's [`default_config`](Plugin::default_config) is deep-merged with
//! the application's configuration under that namespace, and the result is
//! handed to [`register_services`](Plugin::register_services).
//!
//! # Example
//!
//! ```
//! use serde_json::{json, Value};
//! use trellis_inject::Injector;
//! use trellis_kernel::{KernelError, Plugin};
//!
//! struct CachePlugin;
//!
//! impl Plugin for CachePlugin {
//!     fn namespace(&self) -> &str {
//!         "cache"
//!     }
//!
//!     fn default_config(&self) -> Value {
//!         json!({ "capacity": 128 })
//!     }
//!
//!     fn register_services(&self, injector: &Injector, config: &Value) -> Result<(), KernelError> {
//!         let capacity = config["capacity"].as_u64().unwrap_or(128);
//!         injector
//!             .container()
//!             .register_value("cache.capacity", capacity, Default::default());
//!         Ok(())
//!     }
//! }
//! ```

use serde_json::Value;
use trellis_inject::Injector;

use crate::error::KernelError;

/// A namespaced bundle of service registrations.
pub trait Plugin: Send + Sync + 'static {
    /// The namespace used when none is given at
    /// [`Kernel::add_plugin`](crate::Kernel::add_plugin).
    fn namespace(&self) -> &str;

    /// Configuration used for keys the application does not set.
    ///
    /// Defaults to an empty object.
    fn default_config(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Registers the plugin's services with its merged configuration.
    ///
    /// Called once, during [`Kernel::boot`](crate::Kernel::boot), in the
    /// order plugins were added.
    ///
    /// # Errors
    ///
    /// Any error aborts the boot.
    fn register_services(&self, _injector: &Injector, _config: &Value) -> Result<(), KernelError> {
        Ok(())
    }

    /// Returns the plugin's name for debugging and error messages.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

/// Options for [`Kernel::add_plugin`](crate::Kernel::add_plugin).
///
/// # Example
///
/// ```
/// use trellis_kernel::AddPluginOptions;
///
/// let options = AddPluginOptions::new()
///     .with_namespace("audit")
///     .with_envs(["staging", "production"]);
/// assert!(options.allows("production"));
/// assert!(!options.allows("development"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPluginOptions {
    namespace: Option<String>,
    envs: Option<Vec<String>>,
}

impl AddPluginOptions {
    /// Creates options that keep the plugin's namespace and every environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the plugin's namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Restricts the plugin to the given environments.
    #[must_use]
    pub fn with_envs<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envs = Some(envs.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the namespace override, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns whether the plugin is enabled in `env`.
    #[must_use]
    pub fn allows(&self, env: &str) -> bool {
        self.envs
            .as_ref()
            .is_none_or(|envs| envs.iter().any(|allowed| allowed == env))
    }
}
