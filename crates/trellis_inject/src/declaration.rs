//! Declarations: how a unit's positional dependency list is obtained.
//!
//! | Shape | Constructor | List comes from |
//! |-------|-------------|-----------------|
//! | listed | [`Declaration::depends_on`] | an explicit ordered list, resolved concurrently |
//! | injected | [`Declaration::injected`] | the injector's side table, plus [`provide`](Declaration::provide)d positions |
//! | computed | [`Declaration::computed`] | a caller-supplied async function |
//!
//! All three shapes reduce to one dependency source that produces the list
//! at first build. Every element is resolved before
//! [`Injectable::construct`] runs.

use core::future::Future;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::RwLock;
use trellis_container::{
    BoxFuture, ContainerError, FactoryOptions, Instance, Resolver, ServiceKey, TagSet, TagValue,
    TypeKey,
};

use crate::dependency::Dependency;
use crate::injector::ParamTable;
use crate::unit::Injectable;

pub(crate) type ComputeFn =
    Arc<dyn Fn(Resolver) -> BoxFuture<'static, Result<Vec<Instance>, ContainerError>> + Send + Sync>;

pub(crate) type ProvideFn =
    Arc<dyn Fn(Resolver) -> BoxFuture<'static, Result<Instance, ContainerError>> + Send + Sync>;

/// Where a unit's positional list comes from.
pub(crate) enum DependencySource {
    Listed(Vec<Dependency>),
    Injected(BTreeMap<usize, ProvideFn>),
    Computed(ComputeFn),
}

impl DependencySource {
    /// Produces the positional list for the unit identified by `unit`.
    pub(crate) async fn collect(
        &self,
        unit: TypeKey,
        resolver: &Resolver,
        params: &RwLock<ParamTable>,
    ) -> Result<Vec<Instance>, ContainerError> {
        match self {
            Self::Listed(dependencies) => {
                try_join_all(dependencies.iter().map(|dependency| {
                    resolver.resolve_instance(dependency.key().clone(), dependency.tags().clone())
                }))
                .await
            }
            Self::Injected(provided) => {
                let descriptors = params.read().descriptors(unit);
                let mut slots: BTreeMap<usize, BoxFuture<'static, Result<Instance, ContainerError>>> =
                    BTreeMap::new();

                for (position, dependency) in descriptors {
                    let resolver = resolver.clone();
                    slots.insert(
                        position,
                        Box::pin(async move {
                            resolver
                                .resolve_instance(dependency.key().clone(), dependency.tags().clone())
                                .await
                        }),
                    );
                }
                for (&position, provide) in provided {
                    if slots.contains_key(&position) {
                        return Err(ContainerError::DuplicateParameterInjection {
                            unit: unit.type_name(),
                            position,
                        });
                    }
                    slots.insert(position, provide(resolver.clone()));
                }

                let gap = slots
                    .keys()
                    .enumerate()
                    .find(|&(expected, &position)| expected != position);
                if let Some((missing, _)) = gap {
                    return Err(ContainerError::ArgumentShape {
                        unit: unit.type_name(),
                        reason: format!("no dependency is declared for position {missing}"),
                    });
                }
                try_join_all(slots.into_values()).await
            }
            Self::Computed(compute) => compute(resolver.clone()).await,
        }
    }
}

/// A unit registration: dependency shape plus factory metadata.
///
/// # Example
///
/// ```ignore
/// injector.register(
///     Declaration::<Mailer>::depends_on(["smtp.config", "templates"])
///         .named("mailer")
///         .with_label("outbound"),
/// )?;
/// ```
pub struct Declaration<U: Injectable> {
    pub(crate) key: Option<ServiceKey>,
    pub(crate) source: DependencySource,
    pub(crate) options: FactoryOptions<U>,
    /// First misuse of [`provide`](Self::provide), reported at registration.
    pub(crate) rejected: Option<ContainerError>,
}

impl<U: Injectable> Declaration<U> {
    fn with_source(source: DependencySource) -> Self {
        Self {
            key: None,
            source,
            options: FactoryOptions::new(),
            rejected: None,
        }
    }

    /// Depends on an explicit, ordered list of services.
    #[must_use]
    pub fn depends_on<I, D>(dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dependency>,
    {
        Self::with_source(DependencySource::Listed(
            dependencies.into_iter().map(Into::into).collect(),
        ))
    }

    /// Takes no dependencies.
    #[must_use]
    pub fn standalone() -> Self {
        Self::with_source(DependencySource::Listed(Vec::new()))
    }

    /// Reads per-position descriptors from the injector's side table at first
    /// build.
    ///
    /// See [`Injector::inject`](crate::Injector::inject).
    #[must_use]
    pub fn injected() -> Self {
        Self::with_source(DependencySource::Injected(BTreeMap::new()))
    }

    /// Computes the whole positional list.
    #[must_use]
    pub fn computed<F, Fut>(compute: F) -> Self
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Instance>, ContainerError>> + Send + 'static,
    {
        let compute: ComputeFn = Arc::new(
            move |resolver: Resolver| -> BoxFuture<'static, Result<Vec<Instance>, ContainerError>> {
                Box::pin(compute(resolver))
            },
        );
        Self::with_source(DependencySource::Computed(compute))
    }

    /// Computes a single position of an [`injected`](Self::injected)
    /// declaration.
    ///
    /// Providing a position twice, or a position that also has a descriptor,
    /// fails registration with [`ContainerError::DuplicateParameterInjection`].
    /// Providing positions for another shape fails registration with
    /// [`ContainerError::ArgumentShape`].
    #[must_use]
    pub fn provide<F, Fut>(mut self, position: usize, provide: F) -> Self
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Instance, ContainerError>> + Send + 'static,
    {
        let provide: ProvideFn = Arc::new(
            move |resolver: Resolver| -> BoxFuture<'static, Result<Instance, ContainerError>> {
                Box::pin(provide(resolver))
            },
        );
        let unit = core::any::type_name::<U>();
        let misuse = match &mut self.source {
            DependencySource::Injected(provided) => provided
                .insert(position, provide)
                .map(|_| ContainerError::DuplicateParameterInjection { unit, position }),
            DependencySource::Listed(_) | DependencySource::Computed(_) => {
                Some(ContainerError::ArgumentShape {
                    unit,
                    reason: format!(
                        "position {position} is provided but the declaration is not injected"
                    ),
                })
            }
        };
        if let Some(err) = misuse {
            self.rejected.get_or_insert(err);
        }
        self
    }

    /// Registers under `key` instead of the unit's type key.
    #[must_use]
    pub fn named(mut self, key: impl Into<ServiceKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.options = self.options.with_tags(tags);
        self
    }

    /// Adds one tag.
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.options = self.options.with_tag(name, value);
        self
    }

    /// Adds a grouping label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.options = self.options.with_label(label);
        self
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.options = self.options.with_alias(alias);
        self
    }

    /// Sets the phase-two wirer.
    #[must_use]
    pub fn with_wirer<F, Fut>(mut self, wirer: F) -> Self
    where
        F: Fn(Arc<U>, Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        self.options = self.options.with_wirer(wirer);
        self
    }
}
