//! # Trellis Internal Library
//!
//! Re-exports the core Trellis crates for convenience.

/// Layer 1: registry, resolver, barrier and service locators.
pub use trellis_container;

/// Layer 2: declarative dependencies and auto-tagging.
pub use trellis_inject;

/// Bootstrap: plugins, configuration merging and loaders.
pub use trellis_kernel;

use trellis_kernel::{Kernel, KernelOptions};

/// Creates the application's kernel, and with it the single container.
///
/// Nothing is registered until plugins and loaders are added and
/// [`Kernel::boot`] runs.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trellis_internal::init;
/// use trellis_kernel::KernelOptions;
///
/// # futures::executor::block_on(async {
/// let mut kernel = init(KernelOptions::new().with_env("test"));
/// kernel.boot(&json!({})).unwrap();
/// kernel.ready().await.unwrap();
/// assert!(kernel.container().is_empty());
/// # });
/// ```
#[must_use]
pub fn init(options: KernelOptions) -> Kernel {
    tracing::debug!(env = %options.env(), debug = options.is_debug(), "creating kernel");
    Kernel::new(options)
}

/// Like [`init`], with options read from the process environment.
#[must_use]
pub fn init_from_env() -> Kernel {
    init(KernelOptions::from_env())
}

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{init, init_from_env};
    pub use trellis_container::prelude::*;
    pub use trellis_inject::prelude::*;
    pub use trellis_kernel::prelude::*;
}
