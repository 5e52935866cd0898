//! Tree-shaped subscription index.
//!
//! The tree mirrors the shape of the state: one node per path that has ever
//! been subscribed, each holding the subscriptions registered exactly there.
//! Lookup, subscribe and unsubscribe cost O(depth), independent of how many
//! subscribers exist elsewhere.

use super::types::Subscription;
use crate::path::Path;
use crate::types::SubscriberId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Index node for one path.
#[derive(Debug, Default)]
pub struct SubscriptionNode {
    path: Path,
    subscriptions: HashMap<SubscriberId, Arc<Subscription>>,
    children: BTreeMap<String, SubscriptionNode>,
}

impl SubscriptionNode {
    fn new(path: Path) -> Self {
        Self {
            path,
            subscriptions: HashMap::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Arc<Subscription>> {
        self.subscriptions.values()
    }

    pub fn subscription(&self, id: &SubscriberId) -> Option<&Arc<Subscription>> {
        self.subscriptions.get(id)
    }

    /// Child nodes in segment order.
    pub fn children(&self) -> impl Iterator<Item = &SubscriptionNode> {
        self.children.values()
    }

    pub fn child(&self, segment: &str) -> Option<&SubscriptionNode> {
        self.children.get(segment)
    }

    /// Number of subscriptions registered exactly here.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// No subscriptions here and no children.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.children.is_empty()
    }

    /// Subscriptions here and in every descendant node.
    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.len()
            + self
                .children
                .values()
                .map(SubscriptionNode::total_subscriptions)
                .sum::<usize>()
    }

    /// Nodes strictly below this one, depth-first pre-order.
    pub fn descendants(&self) -> Vec<&SubscriptionNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&SubscriptionNode> = self.children.values().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.values().rev());
        }
        out
    }
}

/// Root of the subscription index.
#[derive(Debug, Default)]
pub struct SubscriptionTree {
    root: SubscriptionNode,
}

impl SubscriptionTree {
    pub fn new() -> Self {
        Self {
            root: SubscriptionNode::new(Path::root()),
        }
    }

    pub fn root(&self) -> &SubscriptionNode {
        &self.root
    }

    /// Node at `path`, creating missing nodes along the way.
    pub fn get_or_create_node(&mut self, path: &Path) -> &mut SubscriptionNode {
        let segments = path.segments();
        let mut node = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            node = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| {
                    SubscriptionNode::new(Path::from_segments(segments[..=depth].iter().cloned()))
                });
        }
        node
    }

    /// Node at `path`, `None` as soon as a segment is missing.
    pub fn get_node(&self, path: &Path) -> Option<&SubscriptionNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    fn get_node_mut(&mut self, path: &Path) -> Option<&mut SubscriptionNode> {
        path.segments()
            .iter()
            .try_fold(&mut self.root, |node, segment| node.children.get_mut(segment))
    }

    /// Nodes strictly above `path` that exist, nearest first.
    ///
    /// The walk stops at the first missing segment; the root is always
    /// included for a non-root path.
    pub fn ancestors(&self, path: &Path) -> Vec<&SubscriptionNode> {
        let mut out = Vec::with_capacity(path.len());
        let mut node = &self.root;
        for segment in path.segments() {
            out.push(node);
            match node.children.get(segment) {
                Some(next) => node = next,
                None => break,
            }
        }
        out.reverse();
        out
    }

    /// Detach the node at `path` with its whole subtree and hand it back.
    ///
    /// With `prune_empty_ancestors`, ancestors left without subscriptions and
    /// children are removed too. Deleting the root clears the tree and
    /// returns the old root if it held anything.
    pub fn delete_node(
        &mut self,
        path: &Path,
        prune_empty_ancestors: bool,
    ) -> Option<SubscriptionNode> {
        if path.is_root() {
            let old = std::mem::replace(&mut self.root, SubscriptionNode::new(Path::root()));
            return (!old.is_empty()).then_some(old);
        }
        delete_in(&mut self.root, path.segments(), prune_empty_ancestors)
    }

    /// Register `subscription`, replacing any earlier one with the same id at
    /// the same path. Returns the replaced subscription.
    pub fn subscribe(&mut self, subscription: Subscription) -> Option<Arc<Subscription>> {
        self.insert(Arc::new(subscription))
    }

    /// Register an already shared subscription. Same replacement rule as
    /// [`subscribe`](Self::subscribe).
    pub fn insert(&mut self, subscription: Arc<Subscription>) -> Option<Arc<Subscription>> {
        let node = self.get_or_create_node(subscription.path());
        node.subscriptions
            .insert(subscription.id().clone(), subscription)
    }

    /// Remove subscription `id` at `path` and return it. Absent ids and paths
    /// are a no-op.
    ///
    /// With `prune`, the node and any ancestors left empty are dropped.
    pub fn unsubscribe(
        &mut self,
        id: &SubscriberId,
        path: &Path,
        prune: bool,
    ) -> Option<Arc<Subscription>> {
        self.unsubscribe_if(id, path, prune, |_| true)
    }

    /// Like [`unsubscribe`](Self::unsubscribe), but only when `matches`
    /// accepts the registration currently stored under `id`.
    pub fn unsubscribe_if<F>(
        &mut self,
        id: &SubscriberId,
        path: &Path,
        prune: bool,
        matches: F,
    ) -> Option<Arc<Subscription>>
    where
        F: FnOnce(&Arc<Subscription>) -> bool,
    {
        let node = self.get_node_mut(path)?;
        if !node.subscriptions.get(id).is_some_and(matches) {
            return None;
        }
        let removed = node.subscriptions.remove(id);
        if prune && node.is_empty() && !path.is_root() {
            // Pruned nodes hold no subscriptions
            self.delete_node(path, true);
        }
        removed
    }

    /// Total number of subscriptions in the tree.
    pub fn subscription_count(&self) -> usize {
        self.root.total_subscriptions()
    }
}

fn delete_in(
    node: &mut SubscriptionNode,
    segments: &[String],
    prune: bool,
) -> Option<SubscriptionNode> {
    match segments {
        [] => None,
        [leaf] => node.children.remove(leaf),
        [head, rest @ ..] => {
            let child = node.children.get_mut(head)?;
            let removed = delete_in(child, rest, prune)?;
            if prune && child.is_empty() {
                node.children.remove(head);
            }
            Some(removed)
        }
    }
}
