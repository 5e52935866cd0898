//! Main Store struct tying the state value and the subscription index together.

use crate::error::Result;
use crate::path::Path;
use crate::subscriptions::{
    collect, dispatch, Condition, NotifyStats, Selector, SelectorMemo, Subscription,
    SubscriptionConfig, SubscriptionTree, UpdateFilter, WatchConfig, WatchHandle,
};
use crate::types::{ChangeArgs, SubscriberId};
use crate::value::{delete_at, get_at, merge_shallow, set_at};
use crossbeam_channel::{bounded, TrySendError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Update filter for writes that don't specify one.
    pub default_update_filter: UpdateFilter,

    /// Drop subscription nodes left empty by `unsubscribe`.
    /// Default: false (nodes stay until removed with `remove_subscriptions`).
    pub prune_on_unsubscribe: bool,

    /// Channel capacity for watches that don't specify one.
    /// Default: 1000
    pub default_watch_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_update_filter: UpdateFilter::All,
            prune_on_unsubscribe: false,
            default_watch_buffer: 1000,
        }
    }
}

/// One independent state universe: the live value and its subscriptions.
#[derive(Debug)]
pub struct StateRoot {
    pub value: Value,
    pub subscriptions: SubscriptionTree,
}

impl StateRoot {
    /// Empty object state, no subscriptions.
    pub fn new() -> Self {
        Self::with_value(Value::Object(Map::new()))
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            value,
            subscriptions: SubscriptionTree::new(),
        }
    }
}

impl Default for StateRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom merge of the current value with an incoming partial value.
pub type MergeFn = Arc<dyn Fn(&Value, Value) -> Value + Send + Sync>;

/// New value for a write, given directly or computed from the current one.
pub enum StateUpdate {
    Value(Value),
    Updater(Box<dyn FnOnce(Option<&Value>) -> Value + Send>),
}

impl StateUpdate {
    pub fn updater<F>(f: F) -> Self
    where
        F: FnOnce(Option<&Value>) -> Value + Send + 'static,
    {
        StateUpdate::Updater(Box::new(f))
    }

    fn resolve(self, current: Option<&Value>) -> Value {
        match self {
            StateUpdate::Value(value) => value,
            StateUpdate::Updater(f) => f(current),
        }
    }
}

impl From<Value> for StateUpdate {
    fn from(value: Value) -> Self {
        StateUpdate::Value(value)
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Value(value) => f.debug_tuple("Value").field(value).finish(),
            StateUpdate::Updater(_) => write!(f, "Updater(..)"),
        }
    }
}

/// Options for `Store::set_with`.
#[derive(Clone, Default)]
pub struct SetOptions {
    /// Replaces the default shallow object merge.
    pub merge: Option<MergeFn>,
    /// `None` uses `StoreConfig::default_update_filter`.
    pub update_filter: Option<UpdateFilter>,
}

impl SetOptions {
    pub fn merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(&Value, Value) -> Value + Send + Sync + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    pub fn update_filter(mut self, filter: impl Into<UpdateFilter>) -> Self {
        self.update_filter = Some(filter.into());
        self
    }
}

impl fmt::Debug for SetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetOptions")
            .field("merge", &self.merge.is_some())
            .field("update_filter", &self.update_filter)
            .finish()
    }
}

/// Options for `Store::init_with`.
#[derive(Clone, Debug, Default)]
pub struct InitOptions {
    pub update_filter: Option<UpdateFilter>,
}

impl InitOptions {
    pub fn update_filter(mut self, filter: impl Into<UpdateFilter>) -> Self {
        self.update_filter = Some(filter.into());
        self
    }
}

/// Options for `Store::remove`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveOptions {
    /// Also drop the subscription subtree at the removed path.
    pub remove_subscriptions: bool,
    /// Also drop containers (and subscription nodes) left empty.
    pub remove_empty_parents: bool,
}

/// What `Store::reset` clears.
#[derive(Clone, Copy, Debug)]
pub struct ResetOptions {
    pub state: bool,
    pub subscriptions: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            state: true,
            subscriptions: true,
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    root: RwLock<StateRoot>,
    config: StoreConfig,
}

/// Shared handle to a state root.
///
/// Cloning is cheap and every clone addresses the same state. The store is
/// meant to be driven from a single logical thread; the lock only protects
/// memory, it does not order concurrent writers. No user code (updaters,
/// merges, conditions, callbacks) runs while the lock is held, and removed
/// subscriptions are dropped only after it is released, so callbacks may read
/// and write the store re-entrantly. Callbacks that keep a handle
/// should hold a [`WeakStore`] to avoid a reference cycle.
#[derive(Clone, Debug)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle to a store.
#[derive(Clone, Debug)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    /// Create a store with an empty object state.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::from_root(StateRoot::new(), config)
    }

    pub fn from_root(root: StateRoot, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: RwLock::new(root),
                config,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // --- Reads ---

    /// Current value at `path`, `None` if absent.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let path = Path::parse(path)?;
        Ok(self.value_at(&path))
    }

    /// Current value at `path`, or `default` if absent.
    pub fn get_or(&self, path: &str, default: Value) -> Result<Value> {
        Ok(self.get(path)?.unwrap_or(default))
    }

    /// Current value at `path`, deserialized.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Clone of the whole state.
    pub fn snapshot(&self) -> Value {
        self.inner.root.read().value.clone()
    }

    pub(crate) fn value_at(&self, path: &Path) -> Option<Value> {
        get_at(&self.inner.root.read().value, path.segments()).cloned()
    }

    // --- Writes ---

    /// Merge `update` into the value at `path` and notify subscribers.
    pub fn set(&self, path: &str, update: impl Into<StateUpdate>) -> Result<Value> {
        self.set_with(path, update, SetOptions::default())
    }

    /// Merge `update` into the value at `path` and notify subscribers.
    ///
    /// An updater receives the current value. The result is merged with the
    /// current value (shallow object merge unless `options.merge` is given);
    /// with no current value it is stored as is. Returns the stored value.
    ///
    /// The value is stored before subscribers run, so a failing subscriber
    /// leaves the write in place.
    pub fn set_with(
        &self,
        path: &str,
        update: impl Into<StateUpdate>,
        options: SetOptions,
    ) -> Result<Value> {
        let path = Path::parse(path)?;
        let old_value = self.value_at(&path);
        let incoming = update.into().resolve(old_value.as_ref());

        let new_value = match (&old_value, &options.merge) {
            (None, _) => incoming,
            (Some(old), Some(merge)) => merge(old, incoming),
            (Some(old), None) => merge_shallow(old, incoming),
        };

        self.write("set", path, old_value, new_value, options.update_filter)
    }

    /// Replace the value at `path` wholesale and notify subscribers.
    pub fn init(&self, path: &str, update: impl Into<StateUpdate>) -> Result<Value> {
        self.init_with(path, update, InitOptions::default())
    }

    pub fn init_with(
        &self,
        path: &str,
        update: impl Into<StateUpdate>,
        options: InitOptions,
    ) -> Result<Value> {
        let path = Path::parse(path)?;
        let old_value = self.value_at(&path);
        let new_value = update.into().resolve(old_value.as_ref());

        self.write("init", path, old_value, new_value, options.update_filter)
    }

    fn write(
        &self,
        op: &'static str,
        path: Path,
        old_value: Option<Value>,
        new_value: Value,
        update_filter: Option<UpdateFilter>,
    ) -> Result<Value> {
        set_at(&mut self.inner.root.write().value, &path, new_value.clone())?;
        debug!(op, path = %path, "state written");

        let filter =
            update_filter.unwrap_or_else(|| self.inner.config.default_update_filter.clone());
        let change = ChangeArgs::new(path, old_value, new_value);
        self.notify(&change, &filter)?;

        Ok(change.new_value)
    }

    /// Remove the value at `path` without notifying anyone.
    ///
    /// Removing the root resets the state to an empty object. Absent paths
    /// are a no-op.
    pub fn remove(&self, path: &str, options: RemoveOptions) -> Result<()> {
        self.remove_many([path], options)
    }

    /// Remove several paths under one lock. All paths are validated first.
    pub fn remove_many<I, S>(&self, paths: I, options: RemoveOptions) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths
            .into_iter()
            .map(|path| Path::parse(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        // Detached subscriptions are dropped after the lock is released
        let mut detached = Vec::new();
        let mut root = self.inner.root.write();
        for path in &paths {
            if path.is_root() {
                root.value = Value::Object(Map::new());
            } else {
                delete_at(&mut root.value, path.segments(), options.remove_empty_parents);
            }

            if options.remove_subscriptions {
                detached.extend(
                    root.subscriptions
                        .delete_node(path, options.remove_empty_parents),
                );
            }

            debug!(
                path = %path,
                remove_subscriptions = options.remove_subscriptions,
                "state removed"
            );
        }
        drop(root);
        drop(detached);

        Ok(())
    }

    /// Clear state and/or subscriptions.
    pub fn reset(&self, options: ResetOptions) {
        let mut root = self.inner.root.write();
        if options.state {
            root.value = Value::Object(Map::new());
        }
        let detached = options
            .subscriptions
            .then(|| std::mem::take(&mut root.subscriptions));
        drop(root);
        drop(detached);

        debug!(
            state = options.state,
            subscriptions = options.subscriptions,
            "store reset"
        );
    }

    /// Swap in a whole new root, returning the previous one.
    pub fn replace_root(&self, root: StateRoot) -> StateRoot {
        let mut guard = self.inner.root.write();
        std::mem::replace(&mut *guard, root)
    }

    // --- Subscriptions ---

    /// Register a subscription. An existing one with the same id at the same
    /// path is replaced.
    pub fn subscribe(&self, id: impl Into<SubscriberId>, config: SubscriptionConfig) -> Result<()> {
        let subscription = config.build(id.into())?;
        self.register(Arc::new(subscription));
        Ok(())
    }

    fn register(&self, subscription: Arc<Subscription>) {
        debug!(id = %subscription.id(), path = %subscription.path(), "subscribing");

        let replaced = self.inner.root.write().subscriptions.insert(subscription);
        if let Some(previous) = replaced {
            debug!(id = %previous.id(), path = %previous.path(), "replaced subscription");
        }
    }

    /// Remove subscription `id` at `path`. Returns false if there was none.
    pub fn unsubscribe(&self, id: impl Into<SubscriberId>, path: &str) -> Result<bool> {
        let path = Path::parse(path)?;
        Ok(self.unsubscribe_path(&id.into(), &path))
    }

    fn unsubscribe_path(&self, id: &SubscriberId, path: &Path) -> bool {
        self.unsubscribe_if(id, path, |_| true)
    }

    /// Remove `id` at `path` only if `registration` is still what is stored
    /// there. A newer registration under the same id is left alone.
    pub(crate) fn unsubscribe_registration(
        &self,
        id: &SubscriberId,
        path: &Path,
        registration: &Weak<Subscription>,
    ) -> bool {
        self.unsubscribe_if(id, path, |current| {
            std::ptr::eq(Arc::as_ptr(current), registration.as_ptr())
        })
    }

    fn unsubscribe_if<F>(&self, id: &SubscriberId, path: &Path, matches: F) -> bool
    where
        F: FnOnce(&Arc<Subscription>) -> bool,
    {
        let removed = self.inner.root.write().subscriptions.unsubscribe_if(
            id,
            path,
            self.inner.config.prune_on_unsubscribe,
            matches,
        );
        // The guard is gone; the callback (and whatever it owns) drops here
        let found = removed.is_some();
        drop(removed);
        debug!(id = %id, path = %path, removed = found, "unsubscribed");
        found
    }

    /// Total number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.root.read().subscriptions.subscription_count()
    }

    /// Number of subscriptions registered exactly at `path`.
    pub fn subscription_count_at(&self, path: &str) -> Result<usize> {
        let path = Path::parse(path)?;
        Ok(self
            .inner
            .root
            .read()
            .subscriptions
            .get_node(&path)
            .map_or(0, |node| node.len()))
    }

    /// Whether the subscription index has a node at `path`.
    pub fn has_node(&self, path: &str) -> Result<bool> {
        let path = Path::parse(path)?;
        Ok(self.inner.root.read().subscriptions.get_node(&path).is_some())
    }

    /// Condition that accepts a change only when `selector`, applied to the
    /// state at `path`, yields a structurally different value than last time.
    ///
    /// The memo is seeded with the current state, so the first change that
    /// leaves the selected value alone is rejected.
    pub fn selector_condition(&self, path: &str, selector: Selector) -> Result<Condition> {
        let path = Path::parse(path)?;
        let memo = SelectorMemo::new(selector, self.value_at(&path).as_ref());
        let store = self.downgrade();

        Ok(Arc::new(move |_change: &ChangeArgs| match store.upgrade() {
            Some(store) => memo.changed(store.value_at(&path).as_ref()),
            None => false,
        }))
    }

    /// Subscribe through a bounded channel. Dropping the handle unsubscribes.
    pub fn watch(&self, id: impl Into<SubscriberId>, config: WatchConfig) -> Result<WatchHandle> {
        let id = id.into();
        let path = Path::parse(&config.path)?;
        let capacity = config
            .buffer_size
            .unwrap_or(self.inner.config.default_watch_buffer);
        let (sender, receiver) = bounded(capacity);

        let subscription = SubscriptionConfig::new(config.path, move |change, subscription| {
            match sender.try_send(change.clone()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    warn!(
                        id = %subscription.id(),
                        path = %subscription.path(),
                        "watch buffer full, dropping change"
                    );
                    Ok(())
                }
            }
        })
        .filter(config.filter)
        .build(id.clone())?;

        let subscription = Arc::new(subscription);
        let registration = Arc::downgrade(&subscription);
        self.register(subscription);

        Ok(WatchHandle {
            id,
            path,
            registration,
            receiver,
            store: self.downgrade(),
        })
    }

    /// Notify subscribers of a change without writing anything.
    ///
    /// `set` and `init` call this after storing the value. The filter's
    /// condition gates the whole call; then this-path subscribers, ancestors
    /// (nearest first) and descendants (pre-order) are visited. The first
    /// callback error is returned and the rest of the fan-out is abandoned.
    pub fn notify(&self, change: &ChangeArgs, filter: &UpdateFilter) -> Result<NotifyStats> {
        if !filter.passes(change) {
            debug!(path = %change.path, "notification suppressed by update filter");
            return Ok(NotifyStats::default());
        }

        let deliveries = {
            let root = self.inner.root.read();
            collect(&root.subscriptions, &change.path, filter)
        };

        let stats = dispatch(&deliveries, change, filter)?;
        debug!(
            path = %change.path,
            delivered = stats.delivered,
            skipped = stats.skipped,
            "notified subscribers"
        );
        Ok(stats)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
