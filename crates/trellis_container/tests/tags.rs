//! Property tests for tag canonicalization.

use proptest::prelude::*;
use trellis_container::{Container, TagSet};

fn arb_tags() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-z;=\\\\]{1,6}", "[a-z0-9;=\\\\]{0,6}", 0..6)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    /// The canonical key does not depend on insertion order.
    #[test]
    fn tags_key_ignores_insertion_order(pairs in arb_tags()) {
        let forward: TagSet = pairs.iter().cloned().collect();
        let backward: TagSet = pairs.iter().rev().cloned().collect();
        prop_assert_eq!(forward.tags_key(), backward.tags_key());
    }

    /// Distinct tag sets never share a canonical key.
    #[test]
    fn distinct_sets_have_distinct_keys(a in arb_tags(), b in arb_tags()) {
        let left: TagSet = a.iter().cloned().collect();
        let right: TagSet = b.iter().cloned().collect();
        prop_assert_eq!(a == b, left.tags_key() == right.tags_key());
    }

    /// A factory registered with some tags is found with the same tags in any order.
    #[test]
    fn resolution_ignores_tag_order(pairs in arb_tags()) {
        let container = Container::new();
        let tags: TagSet = pairs.iter().cloned().collect();
        container.register_value("svc", pairs.len(), tags);

        let request: TagSet = pairs.iter().rev().cloned().collect();
        let found = futures::executor::block_on(container.resolve_tagged::<usize>("svc", request));
        prop_assert_eq!(found.map(|value| *value).ok(), Some(pairs.len()));
    }
}
