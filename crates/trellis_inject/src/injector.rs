//! The injector: turns declarations into container factories.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use trellis_container::{Container, ContainerError, Resolver, ServiceKey, TypeKey};

use crate::auto_tag::AutoTagging;
use crate::declaration::{Declaration, DependencySource};
use crate::dependency::Dependency;
use crate::unit::{Args, Injectable, UnitInfo};

/// Per-unit constructor metadata: `(unit, position) -> dependency`, plus the
/// positions claimed by computed providers.
#[derive(Default)]
pub(crate) struct ParamTable {
    descriptors: HashMap<TypeKey, BTreeMap<usize, Dependency>>,
    provided: HashMap<TypeKey, BTreeSet<usize>>,
}

impl ParamTable {
    pub(crate) fn descriptors(&self, unit: TypeKey) -> BTreeMap<usize, Dependency> {
        self.descriptors.get(&unit).cloned().unwrap_or_default()
    }

    fn claim_descriptor(
        &mut self,
        unit: TypeKey,
        position: usize,
        dependency: Dependency,
    ) -> Result<(), ContainerError> {
        let provided = self
            .provided
            .get(&unit)
            .is_some_and(|positions| positions.contains(&position));
        let slots = self.descriptors.entry(unit).or_default();
        if provided || slots.contains_key(&position) {
            return Err(ContainerError::DuplicateParameterInjection {
                unit: unit.type_name(),
                position,
            });
        }
        slots.insert(position, dependency);
        Ok(())
    }

    fn claim_provided(
        &mut self,
        unit: TypeKey,
        positions: impl IntoIterator<Item = usize>,
    ) -> Result<(), ContainerError> {
        let positions: Vec<usize> = positions.into_iter().collect();
        if let Some(slots) = self.descriptors.get(&unit)
            && let Some(&position) = positions.iter().find(|position| slots.contains_key(*position))
        {
            return Err(ContainerError::DuplicateParameterInjection {
                unit: unit.type_name(),
                position,
            });
        }
        self.provided.entry(unit).or_default().extend(positions);
        Ok(())
    }
}

/// Registers [`Injectable`] units in a [`Container`].
///
/// Cheap to clone; clones share the side table and the auto-tagging hooks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_container::{Container, ContainerError};
/// use trellis_inject::{Args, Declaration, Injectable, Injector};
///
/// struct Greeting(String);
/// struct Greeter { greeting: Arc<Greeting> }
///
/// impl Injectable for Greeter {
///     fn construct(args: Args) -> Result<Self, ContainerError> {
///         Ok(Self { greeting: args.get(0)? })
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let container = Container::new();
/// container.register_value("greeting", Greeting("hello".into()), Default::default());
///
/// let injector = Injector::new(container.clone());
/// injector.inject::<Greeter>(0, "greeting").unwrap();
/// let key = injector.register(Declaration::<Greeter>::injected()).unwrap();
///
/// let greeter = container.resolve::<Greeter>(key).await.unwrap();
/// assert_eq!(greeter.greeting.0, "hello");
/// # });
/// ```
#[derive(Clone)]
pub struct Injector {
    container: Container,
    params: Arc<RwLock<ParamTable>>,
    taggers: Arc<RwLock<Vec<Arc<dyn AutoTagging>>>>,
}

impl Injector {
    /// Creates an injector registering into `container`.
    #[must_use]
    pub fn new(container: Container) -> Self {
        Self {
            container,
            params: Arc::new(RwLock::new(ParamTable::default())),
            taggers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the container units are registered into.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Adds an auto-tagging hook consulted by every later registration.
    pub fn add_auto_tagging(&self, tagger: impl AutoTagging + 'static) {
        self.taggers.write().push(Arc::new(tagger));
    }

    /// Declares that constructor position `position` of `U` receives
    /// `dependency`.
    ///
    /// May be called before or after `U` is registered; descriptors are only
    /// read when `U` is first built.
    ///
    /// # Errors
    ///
    /// [`ContainerError::DuplicateParameterInjection`] if the position already
    /// has a descriptor or a computed provider.
    pub fn inject<U: 'static>(
        &self,
        position: usize,
        dependency: impl Into<Dependency>,
    ) -> Result<(), ContainerError> {
        let dependency = dependency.into();
        tracing::trace!(
            unit = core::any::type_name::<U>(),
            position,
            dependency = %dependency,
            "declared constructor dependency"
        );
        self.params
            .write()
            .claim_descriptor(TypeKey::of::<U>(), position, dependency)
    }

    /// Returns the descriptors declared for `U`, by position.
    #[must_use]
    pub fn descriptors<U: 'static>(&self) -> Vec<(usize, Dependency)> {
        self.params
            .read()
            .descriptors(TypeKey::of::<U>())
            .into_iter()
            .collect()
    }

    /// Registers a unit and returns the key it was registered under.
    ///
    /// # Errors
    ///
    /// [`ContainerError::DuplicateParameterInjection`] if a provided position
    /// already has a descriptor, or [`ContainerError::ArgumentShape`] if
    /// positions were provided for a declaration that is not injected.
    pub fn register<U: Injectable>(&self, declaration: Declaration<U>) -> Result<ServiceKey, ContainerError> {
        let Declaration {
            key,
            source,
            mut options,
            rejected,
        } = declaration;
        if let Some(err) = rejected {
            return Err(err);
        }

        let unit = TypeKey::of::<U>();
        let key = key.unwrap_or_else(|| ServiceKey::of::<U>());

        if let DependencySource::Injected(provided) = &source
            && !provided.is_empty()
        {
            self.params
                .write()
                .claim_provided(unit, provided.keys().copied())?;
        }

        let info = UnitInfo::of::<U>();
        for tagger in self.taggers.read().iter() {
            for label in tagger.labels(&info, &key) {
                if !options.labels().contains(&label) {
                    options = options.with_label(label);
                }
            }
        }
        for capability in U::capabilities() {
            options = options.with_capability(capability);
        }

        let source = Arc::new(source);
        let params = Arc::clone(&self.params);
        self.container.register(
            key.clone(),
            move |resolver: Resolver| {
                let source = Arc::clone(&source);
                let params = Arc::clone(&params);
                async move {
                    let values = source.collect(unit, &resolver, &params).await?;
                    if let Some(arity) = U::arity()
                        && values.len() != arity
                    {
                        return Err(ContainerError::ArgumentShape {
                            unit: unit.type_name(),
                            reason: format!(
                                "expected {arity} dependencies, got {}",
                                values.len()
                            ),
                        });
                    }
                    U::construct(Args::new(unit.type_name(), values))
                }
            },
            options,
        );

        tracing::debug!(key = %key, unit = unit.type_name(), "registered injectable unit");
        Ok(key)
    }
}

impl core::fmt::Debug for Injector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Injector")
            .field("container", &self.container)
            .field("auto_taggers", &self.taggers.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unit;

    #[test]
    fn descriptors_cannot_be_declared_twice() {
        let mut table = ParamTable::default();
        let unit = TypeKey::of::<Unit>();

        table.claim_descriptor(unit, 0, Dependency::new("a")).unwrap();
        let err = table
            .claim_descriptor(unit, 0, Dependency::new("b"))
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::DuplicateParameterInjection { position: 0, .. }
        ));
    }

    #[test]
    fn provided_positions_conflict_in_either_order() {
        let unit = TypeKey::of::<Unit>();

        let mut descriptor_first = ParamTable::default();
        descriptor_first
            .claim_descriptor(unit, 1, Dependency::new("a"))
            .unwrap();
        assert!(descriptor_first.claim_provided(unit, [0, 1]).is_err());

        let mut provider_first = ParamTable::default();
        provider_first.claim_provided(unit, [1]).unwrap();
        assert!(
            provider_first
                .claim_descriptor(unit, 1, Dependency::new("a"))
                .is_err()
        );
        assert!(
            provider_first
                .claim_descriptor(unit, 0, Dependency::new("a"))
                .is_ok()
        );
    }
}
