//! Error handling tests: malformed paths, shape conflicts, failing subscribers.

use parking_lot::Mutex;
use serde_json::json;
use state_tree::{
    RemoveOptions, StateError, Store, SubscriberId, SubscriptionConfig, WatchConfig,
};
use std::error::Error;
use std::sync::Arc;

// --- Invalid Paths ---

#[test]
fn test_invalid_path_on_every_entry_point() {
    let store = Store::new();

    for bad in ["a..b", ".a", "a.", "a[", "a]", "a[]", "a[1]x]"] {
        assert!(
            matches!(store.get(bad), Err(StateError::InvalidPath { .. })),
            "get accepted {bad:?}"
        );
        assert!(
            matches!(store.set(bad, json!(1)), Err(StateError::InvalidPath { .. })),
            "set accepted {bad:?}"
        );
        assert!(
            matches!(store.init(bad, json!(1)), Err(StateError::InvalidPath { .. })),
            "init accepted {bad:?}"
        );
        assert!(
            matches!(
                store.subscribe("s", SubscriptionConfig::new(bad, |_, _| Ok(()))),
                Err(StateError::InvalidPath { .. })
            ),
            "subscribe accepted {bad:?}"
        );
        assert!(
            matches!(store.unsubscribe("s", bad), Err(StateError::InvalidPath { .. })),
            "unsubscribe accepted {bad:?}"
        );
    }

    assert_eq!(store.snapshot(), json!({}));
    assert_eq!(store.subscription_count(), 0);
}

#[test]
fn test_invalid_path_message_names_path() {
    let store = Store::new();
    let err = store.get("a..b").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a..b"), "unexpected message: {message}");
    assert!(message.contains("empty segment"), "unexpected message: {message}");
}

#[test]
fn test_remove_many_validates_all_first() {
    let store = Store::new();
    store.set("", json!({"a": 1, "b": 2})).unwrap();

    let result = store.remove_many(["a", "b..c"], RemoveOptions::default());

    assert!(matches!(result, Err(StateError::InvalidPath { .. })));
    // Nothing removed
    assert_eq!(store.snapshot(), json!({"a": 1, "b": 2}));
}

#[test]
fn test_watch_invalid_path() {
    let store = Store::new();
    let result = store.watch("w", WatchConfig::new("a..b"));
    assert!(matches!(result, Err(StateError::InvalidPath { .. })));
    assert_eq!(store.subscription_count(), 0);
}

// --- Shape Conflicts ---

#[test]
fn test_named_segment_into_array() {
    let store = Store::new();
    store.set("list", json!([1, 2])).unwrap();

    let err = store.set("list.name", json!(1)).unwrap_err();
    match err {
        StateError::TypeMismatch {
            path,
            expected,
            found,
        } => {
            assert_eq!(path, "list.name");
            assert_eq!(expected, "object");
            assert_eq!(found, "array");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert_eq!(store.get("list").unwrap(), Some(json!([1, 2])));
}

#[test]
fn test_index_past_end() {
    let store = Store::new();
    store.set("list", json!([1, 2])).unwrap();

    // One past the end appends
    store.set("list[2]", json!(3)).unwrap();
    assert_eq!(store.get("list").unwrap(), Some(json!([1, 2, 3])));

    let err = store.set("list[7]", json!(9)).unwrap_err();
    assert!(matches!(
        err,
        StateError::IndexOutOfBounds { index: 7, len: 3, .. }
    ));
}

#[test]
fn test_write_through_scalar_replaces_it() {
    let store = Store::new();
    store.set("a", json!(5)).unwrap();
    store.set("a.b", json!(1)).unwrap();
    assert_eq!(store.get("a").unwrap(), Some(json!({"b": 1})));
}

#[test]
fn test_failed_write_notifies_nobody() {
    let store = Store::new();
    let calls = Arc::new(Mutex::new(0));
    let counted = Arc::clone(&calls);
    store.set("list", json!([])).unwrap();
    store
        .subscribe(
            "s",
            SubscriptionConfig::new("list", move |_, _| {
                *counted.lock() += 1;
                Ok(())
            }),
        )
        .unwrap();

    assert!(store.set("list[4]", json!(1)).is_err());
    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_get_as_wrong_type() {
    let store = Store::new();
    store.set("n", json!("not a number")).unwrap();

    let result = store.get_as::<u64>("n");
    assert!(matches!(result, Err(StateError::Serialization(_))));
}

// --- Subscriber Failures ---

#[test]
fn test_subscriber_error_propagates() {
    let store = Store::new();
    store
        .subscribe(
            "broken",
            SubscriptionConfig::new("a", |_, _| Err("render failed".into())),
        )
        .unwrap();

    let err = store.set("a", json!(1)).unwrap_err();
    match &err {
        StateError::Subscriber { id, path, .. } => {
            assert_eq!(id, &SubscriberId::from("broken"));
            assert_eq!(path, "a");
        }
        other => panic!("expected Subscriber, got {other:?}"),
    }
    assert_eq!(err.source().map(|e| e.to_string()), Some("render failed".to_string()));

    // The write itself went through
    assert_eq!(store.get("a").unwrap(), Some(json!(1)));
}

#[test]
fn test_subscriber_error_aborts_fan_out() {
    let store = Store::new();
    let later = Arc::new(Mutex::new(0));
    let counted = Arc::clone(&later);

    // "a.b" is this-path and runs before the ancestor at "a"
    store
        .subscribe(
            "broken",
            SubscriptionConfig::new("a.b", |_, _| Err("boom".into())),
        )
        .unwrap();
    store
        .subscribe(
            "ancestor",
            SubscriptionConfig::new("a", move |_, _| {
                *counted.lock() += 1;
                Ok(())
            }),
        )
        .unwrap();

    assert!(store.set("a.b", json!(1)).is_err());
    assert_eq!(*later.lock(), 0);
}

#[test]
fn test_skip_callback_error_propagates() {
    let store = Store::new();
    store
        .subscribe(
            "s",
            SubscriptionConfig::new("a", |_, _| Ok(()))
                .condition(|_| false)
                .on_skipped(|_, _| Err("skip handler failed".into())),
        )
        .unwrap();

    let err = store.set("a", json!(1)).unwrap_err();
    assert!(matches!(err, StateError::Subscriber { .. }));
}

// --- Idempotence ---

#[test]
fn test_unsubscribe_unknown() {
    let store = Store::new();
    assert!(!store.unsubscribe("nobody", "a.b").unwrap());
    assert!(!store.unsubscribe("nobody", "").unwrap());
    // Looking up a missing path does not create nodes
    assert!(!store.has_node("a").unwrap());
}

#[test]
fn test_unsubscribe_wrong_path() {
    let store = Store::new();
    store
        .subscribe("s", SubscriptionConfig::new("a.b", |_, _| Ok(())))
        .unwrap();

    assert!(!store.unsubscribe("s", "a").unwrap());
    assert_eq!(store.subscription_count(), 1);
}

#[test]
fn test_remove_absent_is_noop() {
    let store = Store::new();
    store.set("a", json!(1)).unwrap();

    store.remove("x.y.z", RemoveOptions::default()).unwrap();
    store
        .remove(
            "a.b.c",
            RemoveOptions {
                remove_subscriptions: true,
                remove_empty_parents: true,
            },
        )
        .unwrap();

    assert_eq!(store.snapshot(), json!({"a": 1}));
}

#[test]
fn test_dropped_store_watch_handle() {
    let store = Store::new();
    let handle = store.watch("w", WatchConfig::new("a")).unwrap();
    drop(store);

    // Sender went with the store; the handle notices instead of blocking
    assert!(handle.recv().is_err());
    drop(handle);
}
