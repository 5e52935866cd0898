//! Channel-backed subscriptions.
//!
//! A watch is an ordinary subscription whose callback forwards each change
//! into a bounded channel, for consumers that would rather poll or coalesce
//! than run inside the writer's call stack.

use super::types::{Subscription, SubscriptionFilter};
use crate::path::Path;
use crate::store::WeakStore;
use crate::types::{ChangeArgs, SubscriberId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::Weak;
use std::time::Duration;

/// Configuration for a watch.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub path: String,
    pub filter: SubscriptionFilter,
    /// Channel capacity; `None` uses the store default.
    /// A full channel drops new changes until the consumer catches up.
    pub buffer_size: Option<usize>,
}

impl WatchConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: SubscriptionFilter::default(),
            buffer_size: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<SubscriptionFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }
}

/// Receiving end of a watch. Unsubscribes when dropped.
pub struct WatchHandle {
    pub(crate) id: SubscriberId,
    pub(crate) path: Path,
    /// The registration this handle created; a later one under the same id
    /// is not ours to remove.
    pub(crate) registration: Weak<Subscription>,
    pub(crate) receiver: Receiver<ChangeArgs>,
    pub(crate) store: WeakStore,
}

impl WatchHandle {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receive the next change (blocking).
    pub fn recv(&self) -> Result<ChangeArgs, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a change (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeArgs, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeArgs, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything buffered so far.
    pub fn drain(&self) -> Vec<ChangeArgs> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe_registration(&self.id, &self.path, &self.registration);
        }
    }
}
