//! Selector-based update conditions.
//!
//! A selector derives a value from a subscriber's state. Wrapped in a
//! [`SelectorMemo`], it turns into a condition that accepts a change only
//! when the derived value differs structurally from the last one seen.

use crate::path::Path;
use crate::value::get_at;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Derives a value from the state at a subscription's path.
#[derive(Clone)]
pub enum Selector {
    /// Arbitrary projection. Receives `None` when the state is absent.
    Map(Arc<dyn Fn(Option<&Value>) -> Value + Send + Sync>),
    /// Child members, relative to the subscription path, collected into an
    /// array (absent members become `null`).
    Paths(Vec<Path>),
}

impl Selector {
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Selector::Map(Arc::new(f))
    }

    pub fn paths(paths: Vec<Path>) -> Self {
        Selector::Paths(paths)
    }

    pub fn select(&self, state: Option<&Value>) -> Value {
        match self {
            Selector::Map(f) => f(state),
            Selector::Paths(paths) => Value::Array(
                paths
                    .iter()
                    .map(|path| {
                        state
                            .and_then(|state| get_at(state, path.segments()))
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Map(_) => write!(f, "Selector::Map(..)"),
            Selector::Paths(paths) => f.debug_tuple("Selector::Paths").field(paths).finish(),
        }
    }
}

/// A selector plus the last derived value it produced.
#[derive(Debug)]
pub struct SelectorMemo {
    selector: Selector,
    last: Mutex<Value>,
}

impl SelectorMemo {
    /// Seed the memo with the value derived from `state`.
    pub fn new(selector: Selector, state: Option<&Value>) -> Self {
        let last = selector.select(state);
        Self {
            selector,
            last: Mutex::new(last),
        }
    }

    /// Re-derive from `state`; true (and remember) if the value changed.
    pub fn changed(&self, state: Option<&Value>) -> bool {
        let next = self.selector.select(state);
        let mut last = self.last.lock();
        if *last == next {
            false
        } else {
            *last = next;
            true
        }
    }

    pub fn last(&self) -> Value {
        self.last.lock().clone()
    }
}
