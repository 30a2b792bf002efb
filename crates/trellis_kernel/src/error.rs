//! Kernel error types.

use trellis_container::ContainerError;

/// Errors raised while assembling or booting a [`Kernel`](crate::Kernel).
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    /// Two plugins were added under the same namespace.
    #[error("a plugin with namespace `{0}` is already added")]
    DuplicatePlugin(String),

    /// [`Kernel::boot`](crate::Kernel::boot) was called twice.
    #[error("kernel is already booted")]
    AlreadyBooted,

    /// A plugin failed while registering its services.
    #[error("plugin `{namespace}` failed: {message}")]
    Plugin {
        /// Namespace of the failing plugin.
        namespace: String,
        /// What went wrong.
        message: String,
    },

    /// Registration or bootstrap failed inside the container.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl KernelError {
    /// Creates a [`KernelError::Plugin`] for `namespace`.
    pub fn plugin(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            namespace: namespace.into(),
            message: message.into(),
        }
    }
}
