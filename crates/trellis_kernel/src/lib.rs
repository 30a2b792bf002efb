//! Bootstrap kernel for the Trellis container.
//!
//! The kernel is the explicit registration pass: it creates the container,
//! runs plugin registration in a fixed order, and queues asynchronous
//! loaders on the container's bootstrap barrier.
//!
//! | Type | Role |
//! |------|------|
//! | [`Kernel`] | Owns the container; `add_plugin`, `add_loader`, `boot`, `ready` |
//! | [`Plugin`] | Namespaced bundle of registrations with default configuration |
//! | [`AddPluginOptions`] | Namespace override and environment filter |
//! | [`KernelOptions`] | Environment, debug flag, tracing setup |
//! | [`TracingOptions`] | Subscriber level, format and filter |
//!
//! # Example
//!
//! ```
//! use serde_json::{json, Value};
//! use trellis_inject::Injector;
//! use trellis_kernel::{AddPluginOptions, Kernel, KernelError, KernelOptions, Plugin};
//!
//! struct PoolPlugin;
//!
//! impl Plugin for PoolPlugin {
//!     fn namespace(&self) -> &str {
//!         "pool"
//!     }
//!
//!     fn default_config(&self) -> Value {
//!         json!({ "size": 4, "timeout_ms": 500 })
//!     }
//!
//!     fn register_services(&self, injector: &Injector, config: &Value) -> Result<(), KernelError> {
//!         let size = config["size"]
//!             .as_u64()
//!             .ok_or_else(|| KernelError::plugin("pool", "`size` must be an integer"))?;
//!         injector.container().register_value("pool.size", size, Default::default());
//!         Ok(())
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let mut kernel = Kernel::new(KernelOptions::new());
//! kernel.add_plugin(PoolPlugin, AddPluginOptions::new()).unwrap();
//! kernel.boot(&json!({ "pool": { "size": 16 } })).unwrap();
//! kernel.ready().await.unwrap();
//!
//! let size = kernel.container().resolve::<u64>("pool.size").await.unwrap();
//! assert_eq!(*size, 16);
//! # });
//! ```

mod config;
mod error;
mod kernel;
mod logging;
mod options;
mod plugin;

pub use config::merge_config;
pub use error::KernelError;
pub use kernel::Kernel;
pub use logging::{LogFormat, TracingOptions};
pub use options::{DEBUG_VAR, DEFAULT_ENV, ENV_VAR, KernelOptions, LOG_FORMAT_VAR, LOG_VAR};
pub use plugin::{AddPluginOptions, Plugin};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        AddPluginOptions, Kernel, KernelError, KernelOptions, LogFormat, Plugin, TracingOptions,
    };
}
