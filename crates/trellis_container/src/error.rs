//! Container errors.

use std::sync::Arc;

use crate::key::ServiceKey;
use crate::tags::TagSet;

/// Errors raised while registering or resolving services.
///
/// The type is `Clone` because one in-flight build hands its outcome to every
/// caller waiting on it. Foreign error sources are held behind `Arc` for the
/// same reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    /// No factory matches the requested key and tag set.
    #[error("could not find any factory for `{key}` with tags {tags}")]
    UnknownService {
        /// The requested key.
        key: ServiceKey,
        /// The requested tags.
        tags: TagSet,
    },

    /// More than one factory matches the requested key and tag set.
    #[error("found {count} factories for `{key}` matching tags {tags}")]
    AmbiguousRegistration {
        /// The requested key.
        key: ServiceKey,
        /// The requested tags.
        tags: TagSet,
        /// How many factories matched.
        count: usize,
    },

    /// No factory carries the requested alias.
    #[error("no factory is registered under alias `{0}`")]
    UnknownAlias(String),

    /// An alias is claimed by more than one factory.
    #[error("alias `{alias}` is claimed by both `{first}` and `{second}`")]
    DuplicateAlias {
        /// The contested alias.
        alias: String,
        /// The key that claimed it first.
        first: ServiceKey,
        /// The key that claimed it again.
        second: ServiceKey,
    },

    /// A builder needs a value whose construction has not finished phase one.
    #[error("circular dependency while constructing `{key}` (path: {})", render_path(.path))]
    CircularDependency {
        /// The key that could not be provided.
        key: ServiceKey,
        /// The chain of keys under construction, outermost first.
        path: Vec<ServiceKey>,
    },

    /// The resolved instance is not of the requested type.
    #[error("`{key}` does not hold a `{expected}`")]
    TypeMismatch {
        /// The resolved key.
        key: ServiceKey,
        /// The requested type name.
        expected: &'static str,
    },

    /// The factory did not declare the requested capability.
    #[error("`{key}` does not provide capability `{capability}`")]
    MissingCapability {
        /// The resolved key.
        key: ServiceKey,
        /// The requested capability type name.
        capability: &'static str,
    },

    /// A positional dependency list does not fit the unit being constructed.
    #[error("argument shape error for `{unit}`: {reason}")]
    ArgumentShape {
        /// The unit being constructed.
        unit: &'static str,
        /// What is wrong with the list.
        reason: String,
    },

    /// A constructor position is supplied twice.
    #[error(
        "dependency at position {position} of `{unit}` is supplied both by an injection \
         descriptor and by a computed provider"
    )]
    DuplicateParameterInjection {
        /// The unit being declared.
        unit: &'static str,
        /// The contested position.
        position: usize,
    },

    /// A builder, wirer or bootstrap step failed with its own error.
    #[error("{0}")]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl ContainerError {
    /// Wraps an arbitrary error (or message) raised by a builder or wirer.
    ///
    /// ```
    /// use trellis_container::ContainerError;
    ///
    /// let err = ContainerError::custom("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(Arc::from(error.into()))
    }

    /// Returns true for the fatal cycle error.
    #[must_use]
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}

fn render_path(path: &[ServiceKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
