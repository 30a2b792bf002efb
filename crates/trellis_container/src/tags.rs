//! Tag sets and their canonical form.
//!
//! Several factories may be registered under one [`ServiceKey`](crate::ServiceKey).
//! They are told apart by a [`TagSet`]: a small map from tag name to a scalar
//! [`TagValue`]. Lookups never compare tag sets directly; both sides are
//! canonicalized into a [`TagsKey`] first, so the order in which tags were
//! added is irrelevant.
//!
//! # Canonical Form
//!
//! Tag names are sorted, every pair is rendered as `name=value`, and pairs are
//! joined with `;`. Backslash, `=` and `;` inside names or values are escaped,
//! so two different tag sets can never produce the same key. The empty set
//! produces [`TagsKey::none()`].
//!
//! ```
//! use trellis_container::TagSet;
//!
//! let a = TagSet::new().with("env", "prod").with("shard", 2);
//! let b = TagSet::new().with("shard", 2).with("env", "prod");
//!
//! assert_eq!(a.tags_key(), b.tags_key());
//! assert_eq!(a.tags_key().as_str(), "env=prod;shard=2");
//! assert!(TagSet::new().tags_key().is_none());
//! ```

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// TagValue
// ─────────────────────────────────────────────────────────────────────────────

/// A scalar tag value.
///
/// Values are compared through their rendered form, so `Str("1")` and
/// `Int(1)` select the same factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagValue {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(i64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TagsKey
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical string form of a [`TagSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagsKey(String);

impl TagsKey {
    /// The key of the empty tag set.
    #[must_use]
    pub fn none() -> Self {
        Self(String::new())
    }

    /// Returns true for the key of the empty tag set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("<untagged>")
        } else {
            f.write_str(&self.0)
        }
    }
}

fn push_escaped(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if matches!(ch, '\\' | '=' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TagSet
// ─────────────────────────────────────────────────────────────────────────────

/// Disambiguating metadata attached to a registration or a lookup.
///
/// Setting a tag that already exists replaces its value. Equality is
/// order-independent.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<(String, TagValue)>,
}

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Adds a tag, returning the updated set.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a tag.
    ///
    /// Returns the previous value if the tag was already set.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<TagValue>,
    ) -> Option<TagValue> {
        let name = name.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(core::mem::replace(slot, value)),
            None => {
                self.tags.push((name, value));
                None
            }
        }
    }

    /// Returns the value of a tag.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.tags
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates over tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.tags.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Computes the canonical key of this set.
    #[must_use]
    pub fn tags_key(&self) -> TagsKey {
        let mut sorted: Vec<&(String, TagValue)> = self.tags.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (i, (name, value)) in sorted.into_iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            push_escaped(&mut out, name);
            out.push('=');
            push_escaped(&mut out, &value.to_string());
        }
        TagsKey(out)
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.tags_key() == other.tags_key()
    }
}

impl Eq for TagSet {}

impl<K: Into<String>, V: Into<TagValue>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}
