//! The async service container for Trellis (Layer 1).
//!
//! `trellis_container` owns everything about constructing services:
//!
//! - [`Container`] - registry, value cache, aliases and the bootstrap barrier
//! - [`Resolver`] - the handle builders and wirers resolve dependencies through
//! - [`FactoryOptions`] - tags, alias, labels, capabilities and wirer of a factory
//! - [`TagSet`] - disambiguates several factories registered under one key
//! - [`locator`] - bind-once, read-only views over part of the registry
//!
//! # Construction
//!
//! Every factory is built at most once per `(key, tags)` pair. Construction
//! has two phases: the *builder* produces a raw value, which is cached
//! immediately, and the optional *wirer* completes it. A wirer may resolve
//! services that depend back on the value it is wiring; they receive the raw
//! value instead of deadlocking. A builder that needs a value whose own
//! builder has not finished fails with [`ContainerError::CircularDependency`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use trellis_container::prelude::*;
//!
//! struct Parent { child: Mutex<Option<Arc<Child>>> }
//! struct Child { parent: Arc<Parent> }
//!
//! # futures::executor::block_on(async {
//! let container = Container::new();
//! container.register(
//!     "parent",
//!     |_| async { Ok(Parent { child: Mutex::new(None) }) },
//!     FactoryOptions::new().with_wirer(|parent: Arc<Parent>, resolver: Resolver| async move {
//!         *parent.child.lock() = Some(resolver.resolve::<Child>("child").await?);
//!         Ok(())
//!     }),
//! );
//! container.register(
//!     "child",
//!     |resolver: Resolver| async move {
//!         Ok(Child { parent: resolver.resolve::<Parent>("parent").await? })
//!     },
//!     FactoryOptions::new(),
//! );
//!
//! let parent = container.resolve::<Parent>("parent").await.unwrap();
//! let child = parent.child.lock().clone().unwrap();
//! assert!(Arc::ptr_eq(&child.parent, &parent));
//! # });
//! ```

mod barrier;
mod container;
mod entry;
mod error;
mod key;
mod resolver;
mod state;
mod tags;

/// Bind-once service locators.
pub mod locator;

pub use container::Container;
pub use entry::{BoxFuture, Capability, FactoryEntry, FactoryOptions, Instance};
pub use error::ContainerError;
pub use key::{ServiceKey, TypeKey};
pub use locator::{
    FilteredServiceLocator, LocatorBinding, LocatorError, ServiceLocator, TaggedServiceLocator,
};
pub use resolver::Resolver;
pub use tags::{TagSet, TagValue, TagsKey};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::locator::{
        FilteredServiceLocator, LocatorBinding, LocatorError, ServiceLocator,
        TaggedServiceLocator,
    };
    pub use crate::{
        Capability, Container, ContainerError, FactoryEntry, FactoryOptions, Instance, Resolver,
        ServiceKey, TagSet, TagValue, TagsKey, TypeKey,
    };
}
