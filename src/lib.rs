//! # State Tree
//!
//! Path-addressable shared application state with fine-grained change
//! notification.
//!
//! ## Core Concepts
//!
//! - **Paths**: dot-separated addresses into a nested JSON value (`""` is the root)
//! - **Store**: owns one state value and one subscription index
//! - **Subscriptions**: callbacks registered at a path, kept in a tree that
//!   mirrors the state, so a write only visits its own path, its ancestors
//!   and its subtree
//! - **Filters**: each write chooses which of those groups it reaches; each
//!   subscription chooses which directions (and conditions) it accepts
//!
//! ## Example
//!
//! ```ignore
//! use state_tree::{Store, SubscriptionConfig, DirectionFilter};
//! use serde_json::json;
//!
//! let store = Store::new();
//!
//! // Re-render when "todos" or anything below it changes
//! store.subscribe("todo-list", SubscriptionConfig::new("todos", |change, _| {
//!     println!("todos changed at {}", change.path);
//!     Ok(())
//! }))?;
//!
//! store.set("todos.items", json!([]))?;
//! store.set("todos", json!({"filter": "open"}))?; // shallow merge
//!
//! // Teardown is silent
//! store.remove("todos", Default::default())?;
//! store.unsubscribe("todo-list", "todos")?;
//! ```

pub mod error;
pub mod path;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod value;

// Re-exports
pub use error::{BoxError, Result, StateError};
pub use path::{split_path, Path};
pub use store::{
    InitOptions, MergeFn, RemoveOptions, ResetOptions, SetOptions, StateRoot, StateUpdate, Store,
    StoreConfig, WeakStore,
};
pub use subscriptions::{
    CallbackResult, Condition, DirectionFilter, NotifyStats, Selector, SelectorMemo, Subscription,
    SubscriptionConfig, SubscriptionFilter, SubscriptionNode, SubscriptionTree, UpdateCallback,
    UpdateFilter, UpdateScope, WatchConfig, WatchHandle,
};
pub use types::{ChangeArgs, Relation, SubscriberId};
