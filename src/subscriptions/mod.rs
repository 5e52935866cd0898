//! Subscription index and notification engine.
//!
//! Subscriptions live in a tree that mirrors the state tree. A write at some
//! path reaches:
//! - subscribers at that exact path
//! - subscribers at ancestor paths (they accept via `child_state`)
//! - subscribers at descendant paths (they accept via `parent_state`)
//!
//! Each write carries an [`UpdateFilter`] choosing which of these groups are
//! considered; each subscription carries a [`SubscriptionFilter`] deciding
//! whether it accepts. Eligible-but-rejected subscriptions get
//! `on_update_skipped`.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new();
//!
//! store.subscribe("panel", SubscriptionConfig::new("a.b", |change, _| {
//!     println!("{} changed", change.path);
//!     Ok(())
//! }))?;
//!
//! store.set("a.b.c", json!(2))?; // reaches "panel" (descendant write)
//! store.set("a", json!({}))?;    // does not (ancestor write, not opted in)
//! ```

mod notifier;
mod selector;
mod tree;
mod types;
mod watch;

pub(crate) use notifier::{collect, dispatch};
pub use notifier::NotifyStats;
pub use selector::{Selector, SelectorMemo};
pub use tree::{SubscriptionNode, SubscriptionTree};
pub use types::{
    CallbackResult, Condition, DirectionFilter, Subscription, SubscriptionConfig,
    SubscriptionFilter, UpdateCallback, UpdateFilter, UpdateScope,
};
pub use watch::{WatchConfig, WatchHandle};
