//! Notification fan-out.
//!
//! A notification runs in two phases. `collect` walks the index under the
//! store's read lock and snapshots every structurally eligible subscription:
//! those at the changed path, on the ancestor walk (nearest first) and in the
//! subtree below (pre-order). `dispatch` then runs with no lock held, checks
//! each subscription's own filter and calls `on_update` or
//! `on_update_skipped`. The first callback error aborts the remaining
//! fan-out.

use super::tree::SubscriptionTree;
use super::types::{Subscription, UpdateFilter};
use crate::error::{Result, StateError};
use crate::path::Path;
use crate::types::{ChangeArgs, Relation};
use std::sync::Arc;
use tracing::trace;

/// A subscription that is structurally eligible for one change.
#[derive(Clone, Debug)]
pub(crate) struct Delivery {
    pub relation: Relation,
    pub subscription: Arc<Subscription>,
}

/// Outcome counts of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifyStats {
    /// Subscriptions whose `on_update` ran.
    pub delivered: usize,
    /// Eligible subscriptions rejected by their own filter.
    pub skipped: usize,
}

/// Snapshot the subscriptions `filter` lets a change at `path` reach.
pub(crate) fn collect(tree: &SubscriptionTree, path: &Path, filter: &UpdateFilter) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    let this_node = tree.get_node(path);

    if let Some(node) = this_node {
        if filter.includes(Relation::This) {
            push_all(&mut deliveries, Relation::This, node.subscriptions());
        }
    }

    if filter.includes(Relation::Ancestor) {
        for node in tree.ancestors(path) {
            push_all(&mut deliveries, Relation::Ancestor, node.subscriptions());
        }
    }

    if let Some(node) = this_node {
        if filter.includes(Relation::Descendant) {
            for descendant in node.descendants() {
                push_all(&mut deliveries, Relation::Descendant, descendant.subscriptions());
            }
        }
    }

    deliveries
}

fn push_all<'a>(
    out: &mut Vec<Delivery>,
    relation: Relation,
    subscriptions: impl Iterator<Item = &'a Arc<Subscription>>,
) {
    out.extend(subscriptions.map(|subscription| Delivery {
        relation,
        subscription: Arc::clone(subscription),
    }));
}

/// Run the collected deliveries for `args`.
pub(crate) fn dispatch(
    deliveries: &[Delivery],
    args: &ChangeArgs,
    filter: &UpdateFilter,
) -> Result<NotifyStats> {
    let mut stats = NotifyStats::default();

    for Delivery {
        relation,
        subscription,
    } in deliveries
    {
        let accepted = filter.admits(subscription.path())
            && subscription.filter().accepts(*relation, args);

        let outcome = if accepted {
            trace!(
                id = %subscription.id(),
                path = %subscription.path(),
                changed = %args.path,
                relation = %relation,
                "delivering update"
            );
            stats.delivered += 1;
            subscription.on_update(args)
        } else {
            trace!(
                id = %subscription.id(),
                path = %subscription.path(),
                changed = %args.path,
                relation = %relation,
                "skipping update"
            );
            stats.skipped += 1;
            subscription.on_update_skipped(args)
        };

        outcome.map_err(|source| StateError::Subscriber {
            id: subscription.id().clone(),
            path: subscription.path().to_string(),
            source,
        })?;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::{DirectionFilter, SubscriptionConfig, UpdateScope};
    use crate::types::SubscriberId;
    use parking_lot::Mutex;
    use serde_json::json;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn tree_with(subs: &[(&str, &str)]) -> SubscriptionTree {
        let mut tree = SubscriptionTree::new();
        for (id, path) in subs {
            let sub = SubscriptionConfig::new(*path, |_, _| Ok(()))
                .filter(DirectionFilter::all())
                .build(SubscriberId::from(*id))
                .unwrap();
            tree.subscribe(sub);
        }
        tree
    }

    fn summary(deliveries: &[Delivery]) -> Vec<(String, Relation)> {
        deliveries
            .iter()
            .map(|d| (d.subscription.id().to_string(), d.relation))
            .collect()
    }

    #[test]
    fn test_collect_order() {
        let tree = tree_with(&[
            ("root", ""),
            ("a", "a"),
            ("ab", "a.b"),
            ("abc", "a.b.c"),
            ("abd", "a.b.d"),
            ("x", "x"),
        ]);

        let deliveries = collect(&tree, &p("a.b"), &UpdateFilter::All);
        assert_eq!(
            summary(&deliveries),
            vec![
                ("ab".to_string(), Relation::This),
                ("a".to_string(), Relation::Ancestor),
                ("root".to_string(), Relation::Ancestor),
                ("abc".to_string(), Relation::Descendant),
                ("abd".to_string(), Relation::Descendant),
            ]
        );
    }

    #[test]
    fn test_collect_respects_scope() {
        let tree = tree_with(&[("a", "a"), ("ab", "a.b"), ("abc", "a.b.c")]);

        let filter: UpdateFilter = UpdateScope {
            this_path: false,
            descendants: false,
            ..Default::default()
        }
        .into();
        let deliveries = collect(&tree, &p("a.b"), &filter);
        assert_eq!(summary(&deliveries), vec![("a".to_string(), Relation::Ancestor)]);

        assert!(collect(&tree, &p("a.b"), &UpdateFilter::Silent).is_empty());
    }

    #[test]
    fn test_collect_missing_node_reaches_ancestors_only() {
        let tree = tree_with(&[("a", "a")]);
        let deliveries = collect(&tree, &p("a.z.z"), &UpdateFilter::All);
        assert_eq!(summary(&deliveries), vec![("a".to_string(), Relation::Ancestor)]);
    }

    #[test]
    fn test_dispatch_skips_and_aborts() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut tree = SubscriptionTree::new();

        let log = Arc::clone(&calls);
        tree.subscribe(
            SubscriptionConfig::new("a", move |_, sub| {
                log.lock().push(format!("update {}", sub.id()));
                Ok(())
            })
            .filter(DirectionFilter::this_only())
            .on_skipped({
                let log = Arc::clone(&calls);
                move |_, sub| {
                    log.lock().push(format!("skip {}", sub.id()));
                    Ok(())
                }
            })
            .build(SubscriberId::from("s1"))
            .unwrap(),
        );
        tree.subscribe(
            SubscriptionConfig::new("a.b.c", |_, _| Err("boom".into()))
                .filter(DirectionFilter::all())
                .build(SubscriberId::from("s2"))
                .unwrap(),
        );

        let args = ChangeArgs::new(p("a.b"), None, json!(1));
        let deliveries = collect(&tree, &args.path, &UpdateFilter::All);
        let err = dispatch(&deliveries, &args, &UpdateFilter::All).unwrap_err();

        assert!(matches!(err, StateError::Subscriber { ref id, .. } if id.as_str() == "s2"));
        assert_eq!(*calls.lock(), vec!["skip s1".to_string()]);
    }
}
