//! Dependency references: a key plus the tags selecting one of its factories.

use core::fmt;

use trellis_container::{ServiceKey, TagSet, TagValue, TypeKey};

/// One element of a positional dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    key: ServiceKey,
    tags: TagSet,
}

impl Dependency {
    /// Depends on the untagged factory under `key`.
    #[must_use]
    pub fn new(key: impl Into<ServiceKey>) -> Self {
        Self {
            key: key.into(),
            tags: TagSet::new(),
        }
    }

    /// Depends on the untagged factory keyed by the type `T`.
    #[must_use]
    pub fn on<T: ?Sized + 'static>() -> Self {
        Self::new(ServiceKey::of::<T>())
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

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{} {}", self.key, self.tags)
        }
    }
}

impl From<&'static str> for Dependency {
    fn from(key: &'static str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Dependency {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<u64> for Dependency {
    fn from(key: u64) -> Self {
        Self::new(key)
    }
}

impl From<ServiceKey> for Dependency {
    fn from(key: ServiceKey) -> Self {
        Self::new(key)
    }
}

impl From<TypeKey> for Dependency {
    fn from(key: TypeKey) -> Self {
        Self::new(key)
    }
}
