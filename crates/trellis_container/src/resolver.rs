//! Two-phase resolution.
//!
//! A [`Resolver`] is the handle builders and wirers receive. It remembers
//! which slot it is building for, which is how the container tells a genuine
//! cycle (the build we would wait on is itself waiting on us) from two
//! unrelated callers asking for the same service at the same time.
//!
//! # Algorithm
//!
//! 1. Await the bootstrap barrier.
//! 2. Select exactly one factory for `(key, tags_key)`.
//! 3. Under the state lock:
//!    - a ready slot is returned as is;
//!    - a failed slot returns its error;
//!    - a pending slot whose build transitively waits on the caller yields
//!      its raw (phase-one) value, or [`CircularDependency`] if there is none
//!      yet;
//!    - any other pending slot is joined;
//!    - an empty slot gets a new shared build.
//! 4. Release the lock and await the build.
//!
//! A failed build clears its slot so the next resolve builds again. If its
//! raw value was already handed to a cyclic dependent, the slot keeps the
//! failure instead: the dependent holds that value, and a second build would
//! leave two instances of the same service.
//!
//! [`CircularDependency`]: ContainerError::CircularDependency

use std::sync::Arc;

use futures::FutureExt;

use crate::container::{Container, ContainerInner};
use crate::entry::{BoxFuture, FactoryEntry, Instance};
use crate::error::ContainerError;
use crate::key::ServiceKey;
use crate::state::{SharedBuild, Slot, SlotKey};
use crate::tags::TagSet;

/// Resolution handle passed to builders and wirers.
///
/// Cheap to clone. Resolving through the handle a builder was given is what
/// lets the container see dependencies between builds; resolving through a
/// fresh [`Container`] handle from inside a builder bypasses cycle detection.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ContainerInner>,
    path: Arc<[SlotKey]>,
}

impl Resolver {
    pub(crate) fn root(inner: Arc<ContainerInner>) -> Self {
        Self {
            inner,
            path: Arc::from(Vec::new()),
        }
    }

    fn descend(&self, slot: SlotKey) -> Self {
        let mut path = self.path.to_vec();
        path.push(slot);
        Self {
            inner: Arc::clone(&self.inner),
            path: Arc::from(path),
        }
    }

    fn current(&self) -> Option<&SlotKey> {
        self.path.last()
    }

    /// Returns the keys under construction, outermost first.
    #[must_use]
    pub fn path(&self) -> Vec<ServiceKey> {
        self.path.iter().map(|slot| slot.key.clone()).collect()
    }

    /// Returns a handle to the container this resolver belongs to.
    #[must_use]
    pub fn container(&self) -> Container {
        Container::from_inner(Arc::clone(&self.inner))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Public resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolves the untagged factory under `key` as `T`.
    ///
    /// # Errors
    ///
    /// Any [`ContainerError`] raised during selection or construction, or
    /// [`ContainerError::TypeMismatch`] if the instance is not a `T`.
    pub async fn resolve<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, ContainerError> {
        self.resolve_tagged(key, TagSet::new()).await
    }

    /// Resolves the factory under `key` whose tags equal `tags`, as `T`.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub async fn resolve_tagged<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Arc<T>, ContainerError> {
        let key = key.into();
        let instance = self.resolve_instance(key.clone(), tags).await?;
        downcast(&key, instance)
    }

    /// Resolves the factory under `key` whose tags equal `tags`, type-erased.
    ///
    /// # Errors
    ///
    /// [`ContainerError::UnknownService`] or
    /// [`ContainerError::AmbiguousRegistration`] during selection, a failed
    /// bootstrap step, or whatever the builder or wirer raised.
    pub async fn resolve_instance(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Instance, ContainerError> {
        let key = key.into();
        self.inner.barrier.wait().await?;
        let entry = self.inner.find_factory(&key, &tags)?;
        self.instantiate(entry).await
    }

    /// Resolves the factory under `key` and views it through capability `C`.
    ///
    /// ```ignore
    /// let command: Arc<dyn Command> = resolver.resolve_as::<dyn Command>("cmd.build", TagSet::new()).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// [`ContainerError::MissingCapability`] if the factory did not declare
    /// `C`, plus everything [`resolve_instance`](Self::resolve_instance) can
    /// raise.
    pub async fn resolve_as<C: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        tags: TagSet,
    ) -> Result<Arc<C>, ContainerError> {
        let key = key.into();
        self.inner.barrier.wait().await?;
        let entry = self.inner.find_factory(&key, &tags)?;
        let instance = self.instantiate(Arc::clone(&entry)).await?;
        entry
            .cast::<C>(&instance)
            .ok_or_else(|| ContainerError::MissingCapability {
                key,
                capability: core::any::type_name::<C>(),
            })
    }

    /// Resolves the factory carrying `alias` as `T`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::UnknownAlias`], [`ContainerError::DuplicateAlias`],
    /// [`ContainerError::TypeMismatch`] or a construction error.
    pub async fn resolve_by_alias<T: Send + Sync + 'static>(
        &self,
        alias: &str,
    ) -> Result<Arc<T>, ContainerError> {
        self.inner.barrier.wait().await?;
        let entry = self.inner.find_alias(alias)?;
        let key = entry.key.clone();
        let instance = self.instantiate(entry).await?;
        downcast(&key, instance)
    }

    /// Resolves the factory carrying `alias`, type-erased.
    ///
    /// # Errors
    ///
    /// See [`resolve_by_alias`](Self::resolve_by_alias).
    pub async fn resolve_alias_instance(&self, alias: &str) -> Result<Instance, ContainerError> {
        self.inner.barrier.wait().await?;
        let entry = self.inner.find_alias(alias)?;
        self.instantiate(entry).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Slots
    // ─────────────────────────────────────────────────────────────────────

    async fn instantiate(&self, entry: Arc<FactoryEntry>) -> Result<Instance, ContainerError> {
        let slot = SlotKey::of(&entry);

        let (build, _edge) = {
            let mut state = self.inner.state.lock();
            let existing = state.slots.get(&slot).map(|current| match current {
                Slot::Ready(instance) => Seen::Ready(Arc::clone(instance)),
                Slot::Pending { build, raw, .. } => Seen::Pending(build.clone(), raw.clone()),
                Slot::Failed(err) => Seen::Failed(err.clone()),
            });

            let build = match existing {
                Some(Seen::Ready(ready)) => {
                    tracing::trace!(key = %slot.key, tags = %slot.tags_key, "cache hit");
                    return Ok(ready);
                }
                Some(Seen::Failed(err)) => return Err(err),
                Some(Seen::Pending(build, raw)) => {
                    if let Some(current) = self.current()
                        && state.reaches(&slot, current)
                    {
                        return match raw {
                            Some(instance) => {
                                state.share_raw(&slot);
                                tracing::trace!(
                                    key = %slot.key,
                                    tags = %slot.tags_key,
                                    "handing out raw value to a cyclic dependent"
                                );
                                Ok(instance)
                            }
                            None => Err(self.circular(&slot)),
                        };
                    }
                    build
                }
                None => {
                    let build = self.spawn_build(entry, slot.clone());
                    state.slots.insert(
                        slot.clone(),
                        Slot::Pending {
                            build: build.clone(),
                            raw: None,
                            raw_shared: false,
                        },
                    );
                    build
                }
            };

            let edge = self.current().map(|from| {
                state.add_wait(from.clone(), slot.clone());
                WaitEdge {
                    inner: Arc::clone(&self.inner),
                    from: from.clone(),
                    to: slot.clone(),
                }
            });
            (build, edge)
        };

        build.await
    }

    fn spawn_build(&self, entry: Arc<FactoryEntry>, slot: SlotKey) -> SharedBuild {
        let inner = Arc::clone(&self.inner);
        let resolver = self.descend(slot.clone());
        let build: BoxFuture<'static, Result<Instance, ContainerError>> = Box::pin(async move {
            let outcome = run_phases(&inner, &entry, &slot, resolver).await;
            let mut state = inner.state.lock();
            match outcome {
                Ok(instance) => state.finish(&entry, &slot, instance),
                Err(err) => {
                    tracing::debug!(key = %slot.key, tags = %slot.tags_key, error = %err, "construction failed");
                    state.fail(&slot, &err);
                    Err(err)
                }
            }
        });
        build.shared()
    }

    fn circular(&self, slot: &SlotKey) -> ContainerError {
        let mut path = self.path();
        path.push(slot.key.clone());
        ContainerError::CircularDependency {
            key: slot.key.clone(),
            path,
        }
    }
}

impl core::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Resolver")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

async fn run_phases(
    inner: &ContainerInner,
    entry: &FactoryEntry,
    slot: &SlotKey,
    resolver: Resolver,
) -> Result<Instance, ContainerError> {
    tracing::debug!(key = %entry.key, tags = %entry.tags_key, "constructing service");
    let instance = (entry.builder)(resolver.clone()).await?;
    inner.state.lock().store_raw(slot, Arc::clone(&instance));

    if let Some(wirer) = &entry.wirer {
        tracing::debug!(key = %entry.key, tags = %entry.tags_key, "wiring service");
        wirer(Arc::clone(&instance), resolver).await?;
    }
    Ok(instance)
}

fn downcast<T: Send + Sync + 'static>(
    key: &ServiceKey,
    instance: Instance,
) -> Result<Arc<T>, ContainerError> {
    instance
        .downcast::<T>()
        .map_err(|_| ContainerError::TypeMismatch {
            key: key.clone(),
            expected: core::any::type_name::<T>(),
        })
}

enum Seen {
    Ready(Instance),
    Pending(SharedBuild, Option<Instance>),
    Failed(ContainerError),
}

/// A waits-for edge that lives as long as the wait.
struct WaitEdge {
    inner: Arc<ContainerInner>,
    from: SlotKey,
    to: SlotKey,
}

impl Drop for WaitEdge {
    fn drop(&mut self) {
        self.inner.state.lock().remove_wait(&self.from, &self.to);
    }
}
