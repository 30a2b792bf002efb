//! The container handle: registration, queries and bootstrap control.

use core::future::Future;
use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::barrier::Barrier;
use crate::entry::{BoxFuture, BuilderFn, FactoryEntry, FactoryOptions, Instance};
use crate::error::ContainerError;
use crate::key::{ServiceKey, TypeKey};
use crate::resolver::Resolver;
use crate::state::{ResolveState, SlotKey};
use crate::tags::TagSet;

/// Shared container state. Lock order: never hold `registry` and `state`
/// at the same time.
pub(crate) struct ContainerInner {
    registry: RwLock<IndexMap<ServiceKey, Vec<Arc<FactoryEntry>>>>,
    pub(crate) state: Mutex<ResolveState>,
    pub(crate) barrier: Barrier,
}

impl ContainerInner {
    fn new() -> Self {
        Self {
            registry: RwLock::new(IndexMap::new()),
            state: Mutex::new(ResolveState::default()),
            barrier: Barrier::new(),
        }
    }

    /// Selects the single factory under `key` whose tags key equals that of
    /// `tags`.
    pub(crate) fn find_factory(
        &self,
        key: &ServiceKey,
        tags: &TagSet,
    ) -> Result<Arc<FactoryEntry>, ContainerError> {
        let wanted = tags.tags_key();
        let registry = self.registry.read();
        let mut matches = registry
            .get(key)
            .into_iter()
            .flatten()
            .filter(|entry| entry.tags_key == wanted);

        match (matches.next(), matches.count()) {
            (None, _) => Err(ContainerError::UnknownService {
                key: key.clone(),
                tags: tags.clone(),
            }),
            (Some(entry), 0) => Ok(Arc::clone(entry)),
            (Some(_), rest) => Err(ContainerError::AmbiguousRegistration {
                key: key.clone(),
                tags: tags.clone(),
                count: rest + 1,
            }),
        }
    }

    /// Selects the factory carrying `alias`, preferring the alias table
    /// populated by completed builds.
    pub(crate) fn find_alias(&self, alias: &str) -> Result<Arc<FactoryEntry>, ContainerError> {
        let claimed = self.state.lock().alias_slot(alias);
        let registry = self.registry.read();

        if let Some(slot) = claimed {
            let owner = registry
                .get(&slot.key)
                .into_iter()
                .flatten()
                .find(|entry| entry.tags_key == slot.tags_key);
            if let Some(entry) = owner {
                return Ok(Arc::clone(entry));
            }
        }

        let mut carriers = registry
            .values()
            .flatten()
            .filter(|entry| entry.alias.as_deref() == Some(alias));

        match (carriers.next(), carriers.next()) {
            (None, _) => Err(ContainerError::UnknownAlias(alias.to_string())),
            (Some(entry), None) => Ok(Arc::clone(entry)),
            (Some(first), Some(second)) => Err(ContainerError::DuplicateAlias {
                alias: alias.to_string(),
                first: first.key.clone(),
                second: second.key.clone(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Container
// ─────────────────────────────────────────────────────────────────────────────

/// An async dependency injection container.
///
/// Cloning is cheap and every clone shares the same registry, value cache
/// and bootstrap barrier.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_container::{Container, FactoryOptions, TagSet};
///
/// struct Config { url: String }
/// struct Pool { url: String }
///
/// # futures::executor::block_on(async {
/// let container = Container::new();
/// container.register_value("config", Config { url: "postgres://".into() }, TagSet::new());
/// container.register(
///     "pool",
///     |resolver| async move {
///         let config = resolver.resolve::<Config>("config").await?;
///         Ok(Pool { url: config.url.clone() })
///     },
///     FactoryOptions::new(),
/// );
///
/// let pool = container.resolve::<Pool>("pool").await.unwrap();
/// let again = container.resolve::<Pool>("pool").await.unwrap();
/// assert!(Arc::ptr_eq(&pool, &again));
/// # });
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::from_inner(Arc::new(ContainerInner::new()))
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    /// Returns a resolver with an empty construction path.
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        Resolver::root(Arc::clone(&self.inner))
    }

    /// Returns true if both handles point at the same container.
    #[must_use]
    pub fn same_as(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a factory under `key`.
    ///
    /// Registration never fails. Two factories with the same key and tag set
    /// are only reported by resolution or [`check_sanity`](Self::check_sanity).
    pub fn register<T, F, Fut>(&self, key: impl Into<ServiceKey>, builder: F, options: FactoryOptions<T>)
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        let builder: BuilderFn = Arc::new(
            move |resolver: Resolver| -> BoxFuture<'static, Result<Instance, ContainerError>> {
                let pending = builder(resolver);
                Box::pin(async move {
                    let value: Instance = Arc::new(pending.await?);
                    Ok(value)
                })
            },
        );
        self.insert(key.into(), builder, options, Some(TypeKey::of::<T>()));
    }

    /// Registers a ready-made value. Every resolution returns the same
    /// instance.
    pub fn register_value<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        value: T,
        tags: TagSet,
    ) {
        let value: Instance = Arc::new(value);
        let builder: BuilderFn = Arc::new(
            move |_resolver: Resolver| -> BoxFuture<'static, Result<Instance, ContainerError>> {
                let value = Arc::clone(&value);
                Box::pin(async move { Ok(value) })
            },
        );
        let options = FactoryOptions::<T>::new().with_tags(tags);
        self.insert(key.into(), builder, options, Some(TypeKey::of::<T>()));
    }

    fn insert<T>(
        &self,
        key: ServiceKey,
        builder: BuilderFn,
        options: FactoryOptions<T>,
        produces: Option<TypeKey>,
    ) {
        let entry = FactoryEntry {
            key: key.clone(),
            tags_key: options.tags.tags_key(),
            tags: options.tags,
            builder,
            wirer: options.wirer,
            alias: options.alias,
            labels: options.labels,
            produces,
            capabilities: options.capabilities,
        };
        tracing::trace!(
            key = %key,
            tags = %entry.tags_key,
            alias = entry.alias.as_deref(),
            "registered factory"
        );
        self.inner
            .registry
            .write()
            .entry(key)
            .or_default()
            .push(Arc::new(entry));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolves the untagged factory under `key` as `T`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub async fn resolve<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, ContainerError> {
        self.resolver().resolve(key).await
    }

    /// Resolves the factory under `key` matching `tags` as `T`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_tagged`].
    pub async fn resolve_tagged<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Arc<T>, ContainerError> {
        self.resolver().resolve_tagged(key, tags).await
    }

    /// Resolves the factory under `key` matching `tags`, type-erased.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_instance`].
    pub async fn resolve_instance(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Instance, ContainerError> {
        self.resolver().resolve_instance(key, tags).await
    }

    /// Resolves the factory under `key` viewed through capability `C`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_as`].
    pub async fn resolve_as<C: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Arc<C>, ContainerError> {
        self.resolver().resolve_as::<C>(key, tags).await
    }

    /// Resolves the factory carrying `alias` as `T`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_by_alias`].
    pub async fn resolve_by_alias<T: Send + Sync + 'static>(
        &self,
        alias: &str,
    ) -> Result<Arc<T>, ContainerError> {
        self.resolver().resolve_by_alias(alias).await
    }

    /// Resolves the factory carrying `alias`, type-erased.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_alias_instance`].
    pub async fn resolve_alias_instance(&self, alias: &str) -> Result<Instance, ContainerError> {
        self.resolver().resolve_alias_instance(alias).await
    }

    /// Returns the key of the factory carrying `alias` without constructing
    /// anything.
    ///
    /// # Errors
    ///
    /// [`ContainerError::UnknownAlias`] or [`ContainerError::DuplicateAlias`].
    pub fn alias_key(&self, alias: &str) -> Result<ServiceKey, ContainerError> {
        self.inner.find_alias(alias).map(|entry| entry.key.clone())
    }

    /// Returns true if the factory under `key` matching `tags` has a fully
    /// built value cached.
    #[must_use]
    pub fn is_cached(&self, key: impl Into<ServiceKey>, tags: &TagSet) -> bool {
        let slot = SlotKey {
            key: key.into(),
            tags_key: tags.tags_key(),
        };
        self.inner.state.lock().is_ready(&slot)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────────────────

    /// Appends an asynchronous step to the bootstrap barrier.
    ///
    /// Steps run one at a time in the order they were added. Every
    /// resolution started after this call waits for the step to finish. A
    /// step must not resolve from this container, since the resolution
    /// would wait for the step itself.
    ///
    /// Steps are lazy: nothing runs until something awaits the barrier,
    /// through a resolution, a locator query or [`settle`](Self::settle).
    /// Call `settle` to drive queued steps eagerly.
    pub fn pause_for<F>(&self, step: F)
    where
        F: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        self.inner.barrier.extend(step);
    }

    /// Waits for every bootstrap step added so far.
    ///
    /// # Errors
    ///
    /// The error of the first failing step.
    pub async fn settle(&self) -> Result<(), ContainerError> {
        self.inner.barrier.wait().await
    }

    /// Returns how many bootstrap steps were ever added.
    #[must_use]
    pub fn bootstrap_steps(&self) -> usize {
        self.inner.barrier.steps()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Reports ambiguous registrations and contested aliases.
    ///
    /// # Errors
    ///
    /// The first [`ContainerError::AmbiguousRegistration`] or
    /// [`ContainerError::DuplicateAlias`] found, in registration order.
    pub fn check_sanity(&self) -> Result<(), ContainerError> {
        let registry = self.inner.registry.read();
        let mut aliases: HashMap<&str, &ServiceKey> = HashMap::new();

        for (key, entries) in registry.iter() {
            let mut sorted: Vec<&FactoryEntry> = entries.iter().map(AsRef::as_ref).collect();
            sorted.sort_by(|a, b| a.tags_key.cmp(&b.tags_key));
            for pair in sorted.windows(2) {
                if pair[0].tags_key == pair[1].tags_key {
                    let count = sorted
                        .iter()
                        .filter(|entry| entry.tags_key == pair[0].tags_key)
                        .count();
                    return Err(ContainerError::AmbiguousRegistration {
                        key: key.clone(),
                        tags: pair[0].tags.clone(),
                        count,
                    });
                }
            }

            for entry in entries {
                let Some(alias) = entry.alias.as_deref() else {
                    continue;
                };
                if let Some(first) = aliases.insert(alias, &entry.key) {
                    return Err(ContainerError::DuplicateAlias {
                        alias: alias.to_string(),
                        first: first.clone(),
                        second: entry.key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the keys of every factory carrying `label`, in registration
    /// order and without duplicates.
    #[must_use]
    pub fn tagged_factories(&self, label: &str) -> Vec<ServiceKey> {
        self.filter_factories(|_, entry| entry.has_label(label))
    }

    /// Returns the keys of every factory accepted by `predicate`, in
    /// registration order and without duplicates.
    #[must_use]
    pub fn filter_factories<P>(&self, predicate: P) -> Vec<ServiceKey>
    where
        P: Fn(&ServiceKey, &FactoryEntry) -> bool,
    {
        self.inner
            .registry
            .read()
            .iter()
            .filter(|(key, entries)| entries.iter().any(|entry| predicate(key, entry)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns every entry registered under `key`.
    #[must_use]
    pub fn entries(&self, key: &ServiceKey) -> Vec<Arc<FactoryEntry>> {
        self.inner
            .registry
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true if at least one factory is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.inner.registry.read().contains_key(key)
    }

    /// Returns every registered key in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.inner.registry.read().keys().cloned().collect()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.len())
            .field("bootstrap_steps", &self.bootstrap_steps())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_keeps_order() {
        let container = Container::new();
        container.register_value("b", 1_u8, TagSet::new());
        container.register_value("a", 2_u8, TagSet::new());
        container.register_value("b", 3_u8, TagSet::new().with("n", 3));

        assert_eq!(
            container.keys(),
            vec![ServiceKey::from("b"), ServiceKey::from("a")]
        );
        assert_eq!(container.entries(&ServiceKey::from("b")).len(), 2);
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn selection_requires_exact_tags() {
        let container = Container::new();
        container.register_value("db", 1_u8, TagSet::new().with("role", "primary"));

        let err = container
            .inner
            .find_factory(&ServiceKey::from("db"), &TagSet::new())
            .unwrap_err();
        assert!(matches!(err, ContainerError::UnknownService { .. }));

        let found = container
            .inner
            .find_factory(&ServiceKey::from("db"), &TagSet::new().with("role", "primary"))
            .unwrap();
        assert_eq!(found.tags().get("role").map(ToString::to_string), Some("primary".into()));
    }

    #[test]
    fn sanity_reports_duplicate_tag_sets() {
        let container = Container::new();
        container.register_value("db", 1_u8, TagSet::new().with("a", 1).with("b", 2));
        container.register_value("db", 2_u8, TagSet::new().with("b", 2).with("a", 1));

        let err = container.check_sanity().unwrap_err();
        assert!(matches!(
            err,
            ContainerError::AmbiguousRegistration { count: 2, .. }
        ));
    }

    #[test]
    fn sanity_reports_duplicate_aliases() {
        let container = Container::new();
        container.register(
            "one",
            |_| async { Ok(1_u8) },
            FactoryOptions::new().with_alias("shared"),
        );
        container.register(
            "two",
            |_| async { Ok(2_u8) },
            FactoryOptions::new().with_alias("shared"),
        );

        let err = container.check_sanity().unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateAlias { .. }));
        assert!(matches!(
            container.alias_key("shared"),
            Err(ContainerError::DuplicateAlias { .. })
        ));
    }

    #[test]
    fn filters_return_unique_keys() {
        let container = Container::new();
        container.register("x", |_| async { Ok(1_u8) }, FactoryOptions::new().with_label("cmd"));
        container.register(
            "x",
            |_| async { Ok(2_u8) },
            FactoryOptions::new().with_tag("v", 2).with_label("cmd"),
        );
        container.register("y", |_| async { Ok(3_u8) }, FactoryOptions::new());

        assert_eq!(container.tagged_factories("cmd"), vec![ServiceKey::from("x")]);
        assert!(container.tagged_factories("nothing").is_empty());
    }
}
