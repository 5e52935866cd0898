//! Core types shared by the store and the subscription index.

use crate::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Caller-supplied identifier of a subscriber.
///
/// Unique per path: subscribing the same id at the same path again replaces
/// the earlier registration.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        SubscriberId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        SubscriberId(s.to_string())
    }
}

impl From<String> for SubscriberId {
    fn from(s: String) -> Self {
        SubscriberId(s)
    }
}

/// Where a subscription sits relative to a changed path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Subscribed at exactly the changed path.
    This,
    /// Subscribed above the changed path (a descendant was written).
    Ancestor,
    /// Subscribed below the changed path (an ancestor was written).
    Descendant,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::This => write!(f, "this"),
            Relation::Ancestor => write!(f, "ancestor"),
            Relation::Descendant => write!(f, "descendant"),
        }
    }
}

/// Snapshot of one write, handed to every notified callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeArgs {
    /// Path that was written.
    pub path: Path,
    /// Value at `path` before the write (`None` on first initialization).
    pub old_value: Option<Value>,
    /// Value at `path` after the write.
    pub new_value: Value,
}

impl ChangeArgs {
    pub fn new(path: Path, old_value: Option<Value>, new_value: Value) -> Self {
        Self {
            path,
            old_value,
            new_value,
        }
    }

    /// Value at `sub_path` after this write, if the write covers it.
    ///
    /// Only answerable when `sub_path` is the changed path or below it; for
    /// subscribers above the change the caller must read the store.
    pub fn new_value_at(&self, sub_path: &Path) -> Option<&Value> {
        let rest = sub_path.strip_prefix(&self.path)?;
        crate::value::get_at(&self.new_value, rest)
    }

    /// Value at `sub_path` before this write, if the write covers it.
    pub fn old_value_at(&self, sub_path: &Path) -> Option<&Value> {
        let rest = sub_path.strip_prefix(&self.path)?;
        crate::value::get_at(self.old_value.as_ref()?, rest)
    }
}
