//! Auto-tagging hooks.
//!
//! A hook looks at every unit as it is registered and returns extra labels
//! for it, so that call sites do not have to repeat them. Labels feed
//! [`TaggedServiceLocator`](trellis_container::TaggedServiceLocator); they
//! never take part in tag-set selection.

use trellis_container::{ServiceKey, TypeKey};

use crate::unit::UnitInfo;

/// Computes extra labels for a unit at registration time.
pub trait AutoTagging: Send + Sync {
    /// Returns the labels to append for `unit` registered under `key`.
    fn labels(&self, unit: &UnitInfo, key: &ServiceKey) -> Vec<String>;
}

impl<F> AutoTagging for F
where
    F: Fn(&UnitInfo, &ServiceKey) -> Vec<String> + Send + Sync,
{
    fn labels(&self, unit: &UnitInfo, key: &ServiceKey) -> Vec<String> {
        self(unit, key)
    }
}

/// Labels every unit declaring capability `C`.
///
/// ```
/// use trellis_inject::CapabilityTagging;
///
/// trait Command: Send + Sync {}
///
/// let tagging = CapabilityTagging::new::<dyn Command>("command");
/// assert_eq!(tagging.label(), "command");
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityTagging {
    capability: TypeKey,
    label: String,
}

impl CapabilityTagging {
    /// Creates a hook labelling units that implement `C` with `label`.
    #[must_use]
    pub fn new<C: ?Sized + 'static>(label: impl Into<String>) -> Self {
        Self {
            capability: TypeKey::of::<C>(),
            label: label.into(),
        }
    }

    /// Returns the label this hook adds.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl AutoTagging for CapabilityTagging {
    fn labels(&self, unit: &UnitInfo, _key: &ServiceKey) -> Vec<String> {
        if unit.implements_key(self.capability) {
            vec![self.label.clone()]
        } else {
            Vec::new()
        }
    }
}
