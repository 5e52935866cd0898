//! Property tests for paths, storage and notification reach.

use proptest::prelude::*;
use serde_json::json;
use state_tree::{DirectionFilter, Path, Relation, Store, SubscriptionConfig};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn segments(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 0..max)
}

/// Narrow alphabet so generated paths share prefixes often.
fn crowded_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..4)
        .prop_map(|segs| segs.into_iter().map(String::from).collect())
}

fn related(a: &[String], b: &[String]) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

proptest! {
    #[test]
    fn prop_parse_display_canonical(segs in segments(6)) {
        let text = segs.join(".");
        let path = Path::parse(&text).unwrap();
        prop_assert_eq!(path.segments(), segs.as_slice());
        prop_assert_eq!(path.to_string(), text);
    }

    #[test]
    fn prop_indexer_equals_dotted(name in segment(), index in 0usize..100) {
        let bracketed = Path::parse(&format!("{name}[{index}]")).unwrap();
        let dotted = Path::parse(&format!("{name}.{index}")).unwrap();
        prop_assert_eq!(bracketed, dotted);
    }

    #[test]
    fn prop_set_then_get(segs in prop::collection::vec(segment(), 1..6), n in any::<i64>()) {
        let store = Store::new();
        let path = segs.join(".");
        store.set(&path, json!(n)).unwrap();
        prop_assert_eq!(store.get(&path).unwrap(), Some(json!(n)));
    }

    #[test]
    fn prop_init_replaces(segs in prop::collection::vec(segment(), 1..4), a in any::<i64>(), b in any::<i64>()) {
        let store = Store::new();
        let path = segs.join(".");
        store.init(&path, json!({"first": a})).unwrap();
        store.init(&path, json!({"second": b})).unwrap();
        prop_assert_eq!(store.get(&path).unwrap(), Some(json!({"second": b})));
    }

    #[test]
    fn prop_ancestry(base in segments(4), suffix in prop::collection::vec(segment(), 1..4)) {
        let parent = Path::from_segments(base.clone());
        let child = parent.join(&Path::from_segments(suffix));

        prop_assert!(parent.is_ancestor_of(&child));
        prop_assert!(child.is_descendant_of(&parent));
        prop_assert!(!child.is_ancestor_of(&parent));
        prop_assert!(!parent.is_ancestor_of(&parent));
        prop_assert_eq!(parent.relation_to(&child), Some(Relation::Ancestor));
        prop_assert_eq!(child.relation_to(&parent), Some(Relation::Descendant));
        prop_assert_eq!(parent.relation_to(&parent), Some(Relation::This));
    }

    #[test]
    fn prop_notification_reaches_exactly_related(
        subscribers in prop::collection::vec(crowded_path(), 0..12),
        written in crowded_path(),
    ) {
        let store = Store::new();
        for (i, segs) in subscribers.iter().enumerate() {
            store
                .subscribe(
                    format!("s{i}"),
                    SubscriptionConfig::new(segs.join("."), |_, _| Ok(()))
                        .filter(DirectionFilter::all()),
                )
                .unwrap();
        }

        let change = state_tree::ChangeArgs::new(Path::from_segments(written.clone()), None, json!(1));
        let stats = store.notify(&change, &Default::default()).unwrap();

        let expected = subscribers.iter().filter(|segs| related(segs, &written)).count();
        prop_assert_eq!(stats.delivered, expected);
        prop_assert_eq!(stats.skipped, 0);
    }
}
