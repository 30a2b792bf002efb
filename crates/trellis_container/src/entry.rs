//! Factory entries and registration options.
//!
//! A [`FactoryEntry`] is one construction recipe: a builder (phase one), an
//! optional wirer (phase two) and the metadata used to select and group it.
//! Entries are created through [`Container::register`](crate::Container::register)
//! with [`FactoryOptions`].

use core::any::Any;
use core::fmt;
use core::future::Future;
use core::marker::PhantomData;
use core::pin::Pin;
use std::sync::Arc;

use crate::error::ContainerError;
use crate::key::{ServiceKey, TypeKey};
use crate::resolver::Resolver;
use crate::tags::{TagSet, TagValue, TagsKey};

/// A constructed, type-erased service.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased phase-one builder.
pub(crate) type BuilderFn =
    Arc<dyn Fn(Resolver) -> BoxFuture<'static, Result<Instance, ContainerError>> + Send + Sync>;

/// Type-erased phase-two wirer.
pub(crate) type WirerFn = Arc<
    dyn Fn(Instance, Resolver) -> BoxFuture<'static, Result<(), ContainerError>> + Send + Sync,
>;

type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Capability
// ─────────────────────────────────────────────────────────────────────────────

/// A declared view of a constructed instance as `Arc<C>`, usually a trait
/// object.
///
/// Capabilities let locators and auto-tagging ask "does this factory produce
/// something usable as `dyn C`?" without constructing it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_container::Capability;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let capability = Capability::new::<English, dyn Greeter>(|english| english);
/// assert!(capability.type_key().is::<dyn Greeter>());
/// ```
#[derive(Clone)]
pub struct Capability {
    type_key: TypeKey,
    cast: CastFn,
}

impl Capability {
    /// Declares that instances of `T` can be viewed as `Arc<C>`.
    #[must_use]
    pub fn new<T, C>(cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_key: TypeKey::of::<C>(),
            cast: Arc::new(move |instance: &Instance| {
                let concrete = Arc::clone(instance).downcast::<T>().ok()?;
                let view: Instance = Arc::new(cast(concrete));
                Some(view)
            }),
        }
    }

    /// Returns the key of the capability type.
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Casts an instance to this capability, if the types line up.
    #[must_use]
    pub fn cast<C: ?Sized + Send + Sync + 'static>(&self, instance: &Instance) -> Option<Arc<C>> {
        if !self.type_key.is::<C>() {
            return None;
        }
        let view = (self.cast)(instance)?;
        view.downcast::<Arc<C>>()
            .ok()
            .map(|outer| Arc::clone(&*outer))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.type_key).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FactoryEntry
// ─────────────────────────────────────────────────────────────────────────────

/// A registered construction recipe.
pub struct FactoryEntry {
    pub(crate) key: ServiceKey,
    pub(crate) tags: TagSet,
    pub(crate) tags_key: TagsKey,
    pub(crate) builder: BuilderFn,
    pub(crate) wirer: Option<WirerFn>,
    pub(crate) alias: Option<String>,
    pub(crate) labels: Vec<String>,
    pub(crate) produces: Option<TypeKey>,
    pub(crate) capabilities: Vec<Capability>,
}

impl FactoryEntry {
    /// Returns the key this entry is registered under.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Returns the tags this entry was registered with.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the canonical form of [`tags()`](Self::tags).
    #[must_use]
    pub fn tags_key(&self) -> &TagsKey {
        &self.tags_key
    }

    /// Returns the alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the grouping labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns true if the entry carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|existing| existing == label)
    }

    /// Returns the concrete type the builder produces, when known.
    #[must_use]
    pub fn produces(&self) -> Option<TypeKey> {
        self.produces
    }

    /// Returns true if the entry declares the capability `C`.
    #[must_use]
    pub fn implements<C: ?Sized + 'static>(&self) -> bool {
        self.capabilities.iter().any(|cap| cap.type_key.is::<C>())
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns true if the entry has a phase-two wirer.
    #[must_use]
    pub fn has_wirer(&self) -> bool {
        self.wirer.is_some()
    }

    /// Views an instance built by this entry as `Arc<C>`.
    #[must_use]
    pub fn cast<C: ?Sized + Send + Sync + 'static>(&self, instance: &Instance) -> Option<Arc<C>> {
        self.capabilities
            .iter()
            .find_map(|cap| cap.cast::<C>(instance))
    }
}

impl fmt::Debug for FactoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryEntry")
            .field("key", &self.key)
            .field("tags_key", &self.tags_key)
            .field("alias", &self.alias)
            .field("labels", &self.labels)
            .field("produces", &self.produces)
            .field("capabilities", &self.capabilities)
            .field("has_wirer", &self.wirer.is_some())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FactoryOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Options for [`Container::register`](crate::Container::register).
///
/// `T` is the type the builder produces; it types the wirer and capability
/// casts.
///
/// # Example
///
/// ```ignore
/// container.register(
///     "db",
///     |_resolver| async { Ok(Database::connect()) },
///     FactoryOptions::new()
///         .with_tag("role", "primary")
///         .with_alias("db.primary")
///         .with_label("storage")
///         .with_wirer(|db: Arc<Database>, resolver| async move {
///             db.set_metrics(resolver.resolve::<Metrics>("metrics").await?);
///             Ok(())
///         }),
/// );
/// ```
pub struct FactoryOptions<T> {
    pub(crate) tags: TagSet,
    pub(crate) wirer: Option<WirerFn>,
    pub(crate) alias: Option<String>,
    pub(crate) labels: Vec<String>,
    pub(crate) capabilities: Vec<Capability>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for FactoryOptions<T> {
    fn default() -> Self {
        Self {
            tags: TagSet::new(),
            wirer: None,
            alias: None,
            labels: Vec::new(),
            capabilities: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> FactoryOptions<T> {
    /// Creates empty options (untagged, no wirer, no alias, no labels).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Adds one tag.
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(name, value);
        self
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds a grouping label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Adds several grouping labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Declares that the produced `T` can be viewed as `Arc<C>`.
    #[must_use]
    pub fn implements<C: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self {
        self.capabilities.push(Capability::new(cast));
        self
    }

    /// Adds an already-built capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Returns the tags set so far.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the alias set so far.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the labels added so far.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Sets the phase-two wirer.
    ///
    /// The wirer runs after the raw value has been cached, so anything it
    /// resolves may in turn resolve this service and receive the raw value.
    #[must_use]
    pub fn with_wirer<F, Fut>(mut self, wirer: F) -> Self
    where
        F: Fn(Arc<T>, Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        let wirer: WirerFn = Arc::new(
            move |instance: Instance,
                  resolver: Resolver|
                  -> BoxFuture<'static, Result<(), ContainerError>> {
                match instance.downcast::<T>() {
                    Ok(typed) => Box::pin(wirer(typed, resolver)),
                    Err(_) => Box::pin(async {
                        Err(ContainerError::custom(format!(
                            "wirer expected a `{}`",
                            core::any::type_name::<T>()
                        )))
                    }),
                }
            },
        );
        self.wirer = Some(wirer);
        self
    }
}

impl<T> fmt::Debug for FactoryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("tags", &self.tags)
            .field("alias", &self.alias)
            .field("labels", &self.labels)
            .field("capabilities", &self.capabilities)
            .field("has_wirer", &self.wirer.is_some())
            .finish()
    }
}
