//! An async inversion-of-control container.
//!
//! Services are resolved lazily by name, and applications are bootstrapped
//! through plugins. This crate re-exports the container, injection and
//! kernel layers.

pub use trellis_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use trellis_internal::prelude::*;
}
