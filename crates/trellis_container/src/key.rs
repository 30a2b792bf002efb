//! Service keys.
//!
//! A [`ServiceKey`] names a registrable construction target. Three shapes are
//! supported:
//!
//! | Variant | Built from | Typical use |
//! |---------|------------|-------------|
//! | `Name` | `&'static str`, `String` | configuration values, aliases-by-name |
//! | `Id` | `u64` | generated or numeric identifiers |
//! | `Type` | [`ServiceKey::of::<T>()`](ServiceKey::of) | "the service *is* this type" |
//!
//! Keys compare by value. Type keys compare by [`TypeId`] only, so the type
//! name carried for diagnostics never affects lookups.

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::borrow::Cow;

// ─────────────────────────────────────────────────────────────────────────────
// TypeKey
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier for a Rust type, usable as a key or as a capability marker.
///
/// Works for unsized types too, so `TypeKey::of::<dyn Command>()` names the
/// capability "can be viewed as `dyn Command`".
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a `TypeKey` for the given type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if this key names `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceKey
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier for a registrable unit.
///
/// # Example
///
/// ```
/// use trellis_container::ServiceKey;
///
/// struct Mailer;
///
/// let by_name = ServiceKey::from("mailer");
/// let by_id = ServiceKey::from(7_u64);
/// let by_type = ServiceKey::of::<Mailer>();
///
/// assert_eq!(by_name, ServiceKey::from(String::from("mailer")));
/// assert_ne!(by_id, ServiceKey::from(8_u64));
/// assert_eq!(by_type, ServiceKey::of::<Mailer>());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceKey {
    /// A string name.
    Name(Cow<'static, str>),
    /// A numeric identifier.
    Id(u64),
    /// A Rust type.
    Type(TypeKey),
}

impl ServiceKey {
    /// Creates a key naming the type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeKey::of::<T>())
    }

    /// Creates a key from a name.
    #[must_use]
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the type key if this key names a type.
    #[must_use]
    pub fn as_type(&self) -> Option<TypeKey> {
        match self {
            Self::Type(type_key) => Some(*type_key),
            Self::Name(_) | Self::Id(_) => None,
        }
    }
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ServiceKey {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

impl From<u64> for ServiceKey {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<TypeKey> for ServiceKey {
    fn from(type_key: TypeKey) -> Self {
        Self::Type(type_key)
    }
}

impl From<&ServiceKey> for ServiceKey {
    fn from(key: &ServiceKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "#{id}"),
            Self::Type(type_key) => write!(f, "{type_key}"),
        }
    }
}
