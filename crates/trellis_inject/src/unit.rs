//! Injectable units and their positional arguments.

use std::sync::Arc;

use trellis_container::{Capability, ContainerError, Instance, TypeKey};

/// A type the injector knows how to construct from a positional list of
/// resolved dependencies.
///
/// # Example
///
/// ```
/// use trellis_container::ContainerError;
/// use trellis_inject::{Args, Injectable};
///
/// struct Clock;
/// struct Scheduler { clock: std::sync::Arc<Clock> }
///
/// impl Injectable for Scheduler {
///     fn construct(args: Args) -> Result<Self, ContainerError> {
///         Ok(Self { clock: args.get::<Clock>(0)? })
///     }
///
///     fn arity() -> Option<usize> {
///         Some(1)
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Builds the unit from its resolved dependencies.
    ///
    /// # Errors
    ///
    /// Usually [`ContainerError::ArgumentShape`] raised by [`Args::get`].
    fn construct(args: Args) -> Result<Self, ContainerError>;

    /// The number of positional dependencies the unit takes, when fixed.
    ///
    /// A list of any other length fails before [`construct`](Self::construct)
    /// runs.
    fn arity() -> Option<usize> {
        None
    }

    /// Trait-object views of the unit, used by filtered locators and
    /// auto-tagging.
    fn capabilities() -> Vec<Capability> {
        Vec::new()
    }
}

/// Resolved dependencies in constructor order.
pub struct Args {
    unit: &'static str,
    values: Vec<Instance>,
}

impl Args {
    /// Wraps a positional list for `unit`.
    #[must_use]
    pub fn new(unit: &'static str, values: Vec<Instance>) -> Self {
        Self { unit, values }
    }

    /// Returns the name of the unit being constructed.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the argument at `position`, type-erased.
    ///
    /// # Errors
    ///
    /// [`ContainerError::ArgumentShape`] if there is no such position.
    pub fn instance(&self, position: usize) -> Result<Instance, ContainerError> {
        self.values
            .get(position)
            .cloned()
            .ok_or_else(|| self.shape_error(format!("no argument at position {position}")))
    }

    /// Returns the argument at `position` as `T`.
    ///
    /// # Errors
    ///
    /// [`ContainerError::ArgumentShape`] if there is no such position or the
    /// argument is not a `T`.
    pub fn get<T: Send + Sync + 'static>(&self, position: usize) -> Result<Arc<T>, ContainerError> {
        self.instance(position)?.downcast::<T>().map_err(|_| {
            self.shape_error(format!(
                "argument at position {position} is not a `{}`",
                core::any::type_name::<T>()
            ))
        })
    }

    fn shape_error(&self, reason: String) -> ContainerError {
        ContainerError::ArgumentShape {
            unit: self.unit,
            reason,
        }
    }
}

impl core::fmt::Debug for Args {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Args")
            .field("unit", &self.unit)
            .field("len", &self.values.len())
            .finish()
    }
}

/// What auto-tagging hooks get to see of a unit at registration time.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    type_key: TypeKey,
    capabilities: Vec<TypeKey>,
}

impl UnitInfo {
    /// Describes the unit `U`.
    #[must_use]
    pub fn of<U: Injectable>() -> Self {
        Self {
            type_key: TypeKey::of::<U>(),
            capabilities: U::capabilities()
                .iter()
                .map(Capability::type_key)
                .collect(),
        }
    }

    /// Returns the unit's type key.
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Returns true if the unit is `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_key.is::<T>()
    }

    /// Returns true if the unit declares capability `C`.
    #[must_use]
    pub fn implements<C: ?Sized + 'static>(&self) -> bool {
        self.capabilities.iter().any(|capability| capability.is::<C>())
    }

    /// Returns true if the unit declares the capability named by `capability`.
    #[must_use]
    pub fn implements_key(&self, capability: TypeKey) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Port(u16);

    #[test]
    fn args_hand_out_typed_positions() {
        let args = Args::new("Server", vec![Arc::new(Port(8080)) as Instance]);
        assert_eq!(args.get::<Port>(0).unwrap().0, 8080);
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn missing_or_mistyped_positions_are_shape_errors() {
        let args = Args::new("Server", vec![Arc::new(Port(80)) as Instance]);

        let missing = args.get::<Port>(1).unwrap_err();
        assert_eq!(
            missing.to_string(),
            "argument shape error for `Server`: no argument at position 1"
        );

        let mistyped = args.get::<String>(0).unwrap_err();
        assert!(matches!(mistyped, ContainerError::ArgumentShape { .. }));
    }
}
