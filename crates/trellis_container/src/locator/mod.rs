//! Service locators: bind-once, read-only views over a subset of the registry.
//!
//! A locator is created detached, bound to a [`Container`] exactly once, and
//! from then on resolves only the keys its [`select`](ServiceLocator::select)
//! method admits. Locators never register anything.
//!
//! | Locator | Admits |
//! |---------|--------|
//! | [`FilteredServiceLocator`] | keys with an entry accepted by a predicate |
//! | [`TaggedServiceLocator`] | keys with an entry carrying a label |
//!
//! # Example
//!
//! ```ignore
//! let commands = TaggedServiceLocator::new("command");
//! commands.bind(container.clone())?;
//!
//! for command in commands.resolve_all_as::<dyn Command>().await? {
//!     command.run();
//! }
//! ```

use std::sync::{Arc, OnceLock};

use futures::future::try_join_all;

use crate::container::Container;
use crate::entry::{BoxFuture, FactoryEntry, Instance};
use crate::error::ContainerError;
use crate::key::ServiceKey;
use crate::tags::TagSet;

/// Errors raised by service locators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocatorError {
    /// `bind` was called on an already bound locator.
    #[error("locator is already bound to a container")]
    AlreadyBound,

    /// The locator was queried before being bound.
    #[error("locator is not bound to a container")]
    NotBound,

    /// The requested key is outside the locator's supported set.
    #[error("service `{0}` is not supported by this locator")]
    UnsupportedService(ServiceKey),

    /// The container failed to resolve a supported key.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

// ─────────────────────────────────────────────────────────────────────────────
// LocatorBinding
// ─────────────────────────────────────────────────────────────────────────────

/// The bind-once container slot every locator embeds.
#[derive(Debug, Default)]
pub struct LocatorBinding {
    container: OnceLock<Container>,
}

impl LocatorBinding {
    /// Creates an unbound slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the slot.
    ///
    /// # Errors
    ///
    /// [`LocatorError::AlreadyBound`] on every call after the first.
    pub fn bind(&self, container: Container) -> Result<(), LocatorError> {
        self.container
            .set(container)
            .map_err(|_| LocatorError::AlreadyBound)
    }

    /// Returns the bound container.
    ///
    /// # Errors
    ///
    /// [`LocatorError::NotBound`] before [`bind`](Self::bind).
    pub fn container(&self) -> Result<&Container, LocatorError> {
        self.container.get().ok_or(LocatorError::NotBound)
    }

    /// Returns true once bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.container.get().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceLocator
// ─────────────────────────────────────────────────────────────────────────────

/// A read-only facade restricted to the keys chosen by [`select`](Self::select).
///
/// Implementors provide the binding and the selection; everything else is
/// provided. Locators resolve the untagged factory of each key. The
/// resolving methods wait for the bootstrap barrier before selecting, so
/// factories registered by pending steps are already visible.
pub trait ServiceLocator: Send + Sync {
    /// Returns the bind-once slot.
    fn binding(&self) -> &LocatorBinding;

    /// Chooses the supported keys, in registry order.
    fn select(&self, container: &Container) -> Vec<ServiceKey>;

    /// Binds the locator to `container`.
    ///
    /// # Errors
    ///
    /// [`LocatorError::AlreadyBound`] if already bound.
    fn bind(&self, container: Container) -> Result<(), LocatorError> {
        self.binding().bind(container)
    }

    /// Returns the supported keys.
    ///
    /// # Errors
    ///
    /// [`LocatorError::NotBound`] before binding.
    fn supported_services(&self) -> Result<Vec<ServiceKey>, LocatorError> {
        Ok(self.select(self.binding().container()?))
    }

    /// Returns true if `key` is supported.
    ///
    /// # Errors
    ///
    /// [`LocatorError::NotBound`] before binding.
    fn supports(&self, key: &ServiceKey) -> Result<bool, LocatorError> {
        Ok(self.supported_services()?.contains(key))
    }

    /// Resolves a supported key, type-erased.
    fn resolve_instance(&self, key: ServiceKey) -> BoxFuture<'_, Result<Instance, LocatorError>> {
        Box::pin(async move {
            let container = self.binding().container()?;
            container.settle().await?;
            if !self.supports(&key)? {
                return Err(LocatorError::UnsupportedService(key));
            }
            Ok(container.resolve_instance(key, TagSet::new()).await?)
        })
    }

    /// Resolves a supported key as `T`.
    fn resolve<T>(&self, key: impl Into<ServiceKey>) -> BoxFuture<'_, Result<Arc<T>, LocatorError>>
    where
        Self: Sized,
        T: Send + Sync + 'static,
    {
        let key = key.into();
        Box::pin(async move {
            let instance = self.resolve_instance(key.clone()).await?;
            instance.downcast::<T>().map_err(|_| {
                LocatorError::Container(ContainerError::TypeMismatch {
                    key,
                    expected: core::any::type_name::<T>(),
                })
            })
        })
    }

    /// Resolves every supported key, in enumeration order.
    fn resolve_all(&self) -> BoxFuture<'_, Result<Vec<Instance>, LocatorError>> {
        Box::pin(async move {
            let container = self.binding().container()?;
            container.settle().await?;
            let keys = self.select(container);
            let instances = try_join_all(
                keys.into_iter()
                    .map(|key| container.resolve_instance(key, TagSet::new())),
            )
            .await?;
            Ok(instances)
        })
    }

    /// Resolves every supported key viewed through capability `C`.
    fn resolve_all_as<C>(&self) -> BoxFuture<'_, Result<Vec<Arc<C>>, LocatorError>>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
    {
        Box::pin(async move {
            let container = self.binding().container()?;
            container.settle().await?;
            let keys = self.select(container);
            let views = try_join_all(
                keys.into_iter()
                    .map(|key| container.resolve_as::<C>(key, TagSet::new())),
            )
            .await?;
            Ok(views)
        })
    }

    /// Resolves the factory carrying `alias`, provided its key is supported.
    fn resolve_by_alias<'a>(
        &'a self,
        alias: &'a str,
    ) -> BoxFuture<'a, Result<Instance, LocatorError>> {
        Box::pin(async move {
            let container = self.binding().container()?;
            container.settle().await?;
            let key = container.alias_key(alias)?;
            if !self.supports(&key)? {
                return Err(LocatorError::UnsupportedService(key));
            }
            Ok(container.resolve_alias_instance(alias).await?)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FilteredServiceLocator
// ─────────────────────────────────────────────────────────────────────────────

type Predicate = Arc<dyn Fn(&ServiceKey, &FactoryEntry) -> bool + Send + Sync>;

/// Admits keys with at least one entry accepted by a predicate.
pub struct FilteredServiceLocator {
    binding: LocatorBinding,
    predicate: Predicate,
}

impl FilteredServiceLocator {
    /// Creates a locator admitting keys accepted by `predicate`.
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&ServiceKey, &FactoryEntry) -> bool + Send + Sync + 'static,
    {
        Self {
            binding: LocatorBinding::new(),
            predicate: Arc::new(predicate),
        }
    }

    /// Creates a locator admitting factories that declare capability `C`.
    #[must_use]
    pub fn implementing<C: ?Sized + 'static>() -> Self {
        Self::new(|_, entry| entry.implements::<C>())
    }
}

impl ServiceLocator for FilteredServiceLocator {
    fn binding(&self) -> &LocatorBinding {
        &self.binding
    }

    fn select(&self, container: &Container) -> Vec<ServiceKey> {
        container.filter_factories(|key, entry| (self.predicate)(key, entry))
    }
}

impl core::fmt::Debug for FilteredServiceLocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilteredServiceLocator")
            .field("bound", &self.binding.is_bound())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TaggedServiceLocator
// ─────────────────────────────────────────────────────────────────────────────

/// Admits keys with at least one entry carrying a label.
#[derive(Debug)]
pub struct TaggedServiceLocator {
    binding: LocatorBinding,
    label: String,
}

impl TaggedServiceLocator {
    /// Creates a locator for `label`.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            binding: LocatorBinding::new(),
            label: label.into(),
        }
    }

    /// Returns the label this locator selects by.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ServiceLocator for TaggedServiceLocator {
    fn binding(&self) -> &LocatorBinding {
        &self.binding
    }

    fn select(&self, container: &Container) -> Vec<ServiceKey> {
        container.tagged_factories(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_is_set_once() {
        let binding = LocatorBinding::new();
        assert!(matches!(binding.container(), Err(LocatorError::NotBound)));

        binding.bind(Container::new()).unwrap();
        assert!(binding.is_bound());
        assert!(matches!(
            binding.bind(Container::new()),
            Err(LocatorError::AlreadyBound)
        ));
    }

    #[test]
    fn unbound_locator_refuses_queries() {
        let locator = TaggedServiceLocator::new("jobs");
        assert!(matches!(
            locator.supported_services(),
            Err(LocatorError::NotBound)
        ));
    }

    #[test]
    fn bound_container_is_the_given_one() {
        let container = Container::new();
        let locator = FilteredServiceLocator::new(|_, _| true);
        locator.bind(container.clone()).unwrap();
        assert!(locator.binding().container().unwrap().same_as(&container));
    }
}
