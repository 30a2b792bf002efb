//! Resolution state: value slots, the waits-for graph and the alias table.
//!
//! All three live behind one lock so that "is this build waiting on me?" and
//! "start waiting on that build" happen atomically.

use std::sync::Arc;

use futures::future::Shared;
use hashbrown::{HashMap, HashSet};

use crate::entry::{BoxFuture, FactoryEntry, Instance};
use crate::error::ContainerError;
use crate::key::ServiceKey;
use crate::tags::TagsKey;

/// An in-flight build shared by every caller waiting on it.
pub(crate) type SharedBuild = Shared<BoxFuture<'static, Result<Instance, ContainerError>>>;

/// Cache address of one factory: `(key, tags_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) key: ServiceKey,
    pub(crate) tags_key: TagsKey,
}

impl SlotKey {
    pub(crate) fn of(entry: &FactoryEntry) -> Self {
        Self {
            key: entry.key.clone(),
            tags_key: entry.tags_key.clone(),
        }
    }
}

/// A value cache slot.
pub(crate) enum Slot {
    /// Construction in progress. `raw` is set once phase one has finished;
    /// `raw_shared` once it has been handed to a cyclic dependent.
    Pending {
        build: SharedBuild,
        raw: Option<Instance>,
        raw_shared: bool,
    },
    /// Fully built and wired.
    Ready(Instance),
    /// Phase two failed after the raw value reached a dependent. Never
    /// rebuilt, since the dependent keeps the raw value.
    Failed(ContainerError),
}

#[derive(Default)]
pub(crate) struct ResolveState {
    pub(crate) slots: HashMap<SlotKey, Slot>,
    /// `from -> [to]`: the build of `from` is currently awaiting `to`.
    waits: HashMap<SlotKey, Vec<SlotKey>>,
    aliases: HashMap<String, SlotKey>,
}

impl ResolveState {
    /// Returns true if the build of `from` (transitively) waits on `to`.
    pub(crate) fn reaches(&self, from: &SlotKey, to: &SlotKey) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.waits.get(node) {
                stack.extend(next.iter());
            }
        }
        false
    }

    pub(crate) fn add_wait(&mut self, from: SlotKey, to: SlotKey) {
        self.waits.entry(from).or_default().push(to);
    }

    pub(crate) fn remove_wait(&mut self, from: &SlotKey, to: &SlotKey) {
        let Some(targets) = self.waits.get_mut(from) else {
            return;
        };
        if let Some(pos) = targets.iter().position(|target| target == to) {
            targets.swap_remove(pos);
        }
        if targets.is_empty() {
            self.waits.remove(from);
        }
    }

    /// Publishes the phase-one value of a pending slot.
    pub(crate) fn store_raw(&mut self, slot: &SlotKey, instance: Instance) {
        if let Some(Slot::Pending { raw, .. }) = self.slots.get_mut(slot) {
            *raw = Some(instance);
        }
    }

    /// Records that the raw value of a pending slot reached a dependent.
    pub(crate) fn share_raw(&mut self, slot: &SlotKey) {
        if let Some(Slot::Pending { raw_shared, .. }) = self.slots.get_mut(slot) {
            *raw_shared = true;
        }
    }

    /// Marks a slot ready and records its alias.
    pub(crate) fn finish(
        &mut self,
        entry: &FactoryEntry,
        slot: &SlotKey,
        instance: Instance,
    ) -> Result<Instance, ContainerError> {
        if let Some(alias) = entry.alias.as_deref() {
            match self.aliases.get(alias) {
                Some(owner) if owner != slot => {
                    let err = ContainerError::DuplicateAlias {
                        alias: alias.to_string(),
                        first: owner.key.clone(),
                        second: slot.key.clone(),
                    };
                    self.fail(slot, &err);
                    return Err(err);
                }
                Some(_) => {}
                None => {
                    self.aliases.insert(alias.to_string(), slot.clone());
                }
            }
        }
        self.slots
            .insert(slot.clone(), Slot::Ready(Arc::clone(&instance)));
        Ok(instance)
    }

    /// Settles a slot whose build failed.
    ///
    /// The slot is cleared so a later resolve builds again, unless its raw
    /// value already reached a dependent: then the failure is kept and every
    /// later resolve returns it.
    pub(crate) fn fail(&mut self, slot: &SlotKey, err: &ContainerError) {
        match self.slots.get(slot) {
            Some(Slot::Pending {
                raw_shared: true, ..
            }) => {
                self.slots.insert(slot.clone(), Slot::Failed(err.clone()));
            }
            Some(Slot::Pending { .. }) => {
                self.slots.remove(slot);
            }
            _ => {}
        }
    }

    pub(crate) fn alias_slot(&self, alias: &str) -> Option<SlotKey> {
        self.aliases.get(alias).cloned()
    }

    pub(crate) fn is_ready(&self, slot: &SlotKey) -> bool {
        matches!(self.slots.get(slot), Some(Slot::Ready(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &'static str) -> SlotKey {
        SlotKey {
            key: ServiceKey::from(name),
            tags_key: TagsKey::none(),
        }
    }

    #[test]
    fn slot_reaches_itself() {
        let state = ResolveState::default();
        assert!(state.reaches(&slot("a"), &slot("a")));
        assert!(!state.reaches(&slot("a"), &slot("b")));
    }

    #[test]
    fn reachability_follows_wait_edges() {
        let mut state = ResolveState::default();
        state.add_wait(slot("a"), slot("b"));
        state.add_wait(slot("b"), slot("c"));

        assert!(state.reaches(&slot("a"), &slot("c")));
        assert!(!state.reaches(&slot("c"), &slot("a")));
    }

    #[test]
    fn removing_edges_breaks_paths() {
        let mut state = ResolveState::default();
        state.add_wait(slot("a"), slot("b"));
        state.add_wait(slot("a"), slot("b"));

        state.remove_wait(&slot("a"), &slot("b"));
        assert!(state.reaches(&slot("a"), &slot("b")));

        state.remove_wait(&slot("a"), &slot("b"));
        assert!(!state.reaches(&slot("a"), &slot("b")));
    }

    fn pending() -> Slot {
        let build: BoxFuture<'static, Result<Instance, ContainerError>> =
            Box::pin(futures::future::pending());
        Slot::Pending {
            build: futures::FutureExt::shared(build),
            raw: Some(Arc::new(1_u8)),
            raw_shared: false,
        }
    }

    #[test]
    fn failed_builds_are_cleared() {
        let mut state = ResolveState::default();
        state.slots.insert(slot("a"), pending());

        state.fail(&slot("a"), &ContainerError::custom("boom"));
        assert!(!state.slots.contains_key(&slot("a")));
    }

    #[test]
    fn failures_after_sharing_the_raw_value_stick() {
        let mut state = ResolveState::default();
        state.slots.insert(slot("a"), pending());
        state.share_raw(&slot("a"));

        state.fail(&slot("a"), &ContainerError::custom("boom"));
        assert!(matches!(
            state.slots.get(&slot("a")),
            Some(Slot::Failed(err)) if err.to_string() == "boom"
        ));
    }

    #[test]
    fn cyclic_wait_edges_terminate() {
        let mut state = ResolveState::default();
        state.add_wait(slot("a"), slot("b"));
        state.add_wait(slot("b"), slot("a"));

        assert!(!state.reaches(&slot("a"), &slot("z")));
    }
}
