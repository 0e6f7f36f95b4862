//! Property-based tests for the versioning, naming, and graph primitives.

use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{json, Value};

use metastore::core::change::{field_match, ChangeRecorder};
use metastore::core::descriptor::OwnedListSpec;
use metastore::core::fqn::{propagate_owned, Fqn};
use metastore::core::types::{EntityId, EntityKind, VersionNumber};
use metastore::graph::{Edge, EdgeIndex, EdgePattern, Relationship};

fn local_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

proptest! {
    // ============================================================
    // Version numbers
    // ============================================================

    /// Any sequence of bumps is strictly increasing.
    #[test]
    fn version_bumps_are_monotonic(majors in vec(any::<bool>(), 1..40)) {
        let mut version = VersionNumber::initial();
        for is_major in majors {
            let next = if is_major {
                version.next_major()
            } else {
                version.next_minor()
            };
            prop_assert!(next > version);
            version = next;
        }
    }

    /// String form round-trips through parse.
    #[test]
    fn version_parse_round_trip(major in 0u32..1000, minor in 0u32..1000) {
        let version = VersionNumber::new(major, minor);
        prop_assert_eq!(VersionNumber::parse(&version.to_string()).unwrap(), version);
    }

    // ============================================================
    // FQN propagation
    // ============================================================

    /// Hierarchy-named sub-objects always get `owner.name`, regardless of
    /// whatever stale FQN they arrived with.
    #[test]
    fn owned_fqns_follow_the_owner(
        owner_parts in vec(local_name(), 1..4),
        names in vec(local_name(), 1..8),
        stale in proptest::option::of(local_name()),
    ) {
        let owner = Fqn::from_joined(owner_parts.join(".")).unwrap();
        let items: Vec<Value> = names
            .iter()
            .map(|n| match &stale {
                Some(stale) => json!({"name": n, "fullyQualifiedName": stale}),
                None => json!({"name": n}),
            })
            .collect();
        let mut fields = serde_json::Map::new();
        fields.insert("mlFeatures".into(), Value::Array(items));

        propagate_owned(&mut fields, &owner, &[OwnedListSpec::owned("mlFeatures")]).unwrap();

        let features = fields["mlFeatures"].as_array().unwrap();
        for (feature, name) in features.iter().zip(&names) {
            let expected = format!("{owner}.{name}");
            prop_assert_eq!(feature["fullyQualifiedName"].as_str().unwrap(), expected);
        }
    }

    // ============================================================
    // List diffing
    // ============================================================

    /// The natural-key partition is exact: every new element is either
    /// matched or added, every old element either matched or deleted.
    #[test]
    fn list_partition_is_exact(
        old_keys in vec(local_name(), 0..10),
        new_keys in vec(local_name(), 0..10),
    ) {
        let old: Vec<Value> = old_keys.iter().map(|k| json!({"name": k})).collect();
        let new: Vec<Value> = new_keys.iter().map(|k| json!({"name": k})).collect();

        let mut recorder = ChangeRecorder::new(VersionNumber::initial());
        let (added, deleted) =
            recorder.record_list_change("mlFeatures", &old, &new, field_match("name"));

        for value in &added {
            let key = value["name"].as_str().unwrap();
            prop_assert!(new_keys.iter().any(|k| k == key));
            prop_assert!(!old_keys.iter().any(|k| k == key));
        }
        for value in &deleted {
            let key = value["name"].as_str().unwrap();
            prop_assert!(old_keys.iter().any(|k| k == key));
            prop_assert!(!new_keys.iter().any(|k| k == key));
        }
        // List changes never escalate on their own.
        prop_assert!(!recorder.is_major());
    }

    // ============================================================
    // Edge index
    // ============================================================

    /// Re-adding every edge leaves the index unchanged, and removal by
    /// endpoint always clears both directions.
    #[test]
    fn edge_writes_converge(pair_count in 1usize..20) {
        let center = EntityId::random();
        let model = EntityKind::new("mlmodel").unwrap();
        let dashboard = EntityKind::new("dashboard").unwrap();

        let edges: Vec<Edge> = (0..pair_count)
            .map(|_| {
                Edge::new(
                    center,
                    model.clone(),
                    EntityId::random(),
                    dashboard.clone(),
                    Relationship::Uses,
                )
            })
            .collect();

        let mut index = EdgeIndex::new();
        for edge in &edges {
            index.add(edge.clone());
        }
        let len = index.len();
        for edge in &edges {
            prop_assert!(!index.add(edge.clone()));
        }
        prop_assert_eq!(index.len(), len);

        let mut removed = 0;
        for pattern in EdgePattern::either_endpoint(center) {
            removed += index.remove(&pattern);
        }
        prop_assert_eq!(removed, len);
        prop_assert!(index.is_empty());
    }
}
