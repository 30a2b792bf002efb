//! Declarative dependencies for the Trellis container (Layer 2).
//!
//! `trellis_inject` turns "unit `U` needs these services, in this order" into
//! factories registered in a [`Container`](trellis_container::Container):
//!
//! - [`Injectable`] - a unit built from a positional [`Args`] list
//! - [`Declaration`] - one of three ways to obtain that list
//! - [`Injector`] - registers declarations and owns the per-position side table
//! - [`AutoTagging`] - hooks that label units as they are registered
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_container::{Container, ContainerError, Instance};
//! use trellis_inject::{Args, Declaration, Injectable, Injector};
//!
//! struct Doubled(u64);
//!
//! impl Injectable for Doubled {
//!     fn construct(args: Args) -> Result<Self, ContainerError> {
//!         Ok(Self(*args.get::<u64>(0)?))
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let container = Container::new();
//! container.register_value("base", 21_u64, Default::default());
//!
//! let injector = Injector::new(container.clone());
//! injector
//!     .register(Declaration::<Doubled>::computed(|resolver| async move {
//!         let base = resolver.resolve::<u64>("base").await?;
//!         let doubled: Instance = Arc::new(*base * 2);
//!         Ok(vec![doubled])
//!     }))
//!     .unwrap();
//!
//! let value = container.resolve::<Doubled>(trellis_container::ServiceKey::of::<Doubled>()).await.unwrap();
//! assert_eq!(value.0, 42);
//! # });
//! ```

mod auto_tag;
mod declaration;
mod dependency;
mod injector;
mod unit;

pub use auto_tag::{AutoTagging, CapabilityTagging};
pub use declaration::Declaration;
pub use dependency::Dependency;
pub use injector::Injector;
pub use unit::{Args, Injectable, UnitInfo};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        Args, AutoTagging, CapabilityTagging, Declaration, Dependency, Injectable, Injector,
        UnitInfo,
    };
}
