//! Subscription and filter types.

use crate::error::{BoxError, Result};
use crate::path::Path;
use crate::types::{ChangeArgs, Relation, SubscriberId};
use std::fmt;
use std::sync::Arc;

/// Result of a subscriber callback. An error aborts the rest of the fan-out.
pub type CallbackResult = std::result::Result<(), BoxError>;

/// Callback invoked with the change and the subscription it was delivered to.
pub type UpdateCallback = Arc<dyn Fn(&ChangeArgs, &Subscription) -> CallbackResult + Send + Sync>;

/// Predicate over a change.
pub type Condition = Arc<dyn Fn(&ChangeArgs) -> bool + Send + Sync>;

/// Which changes a subscription accepts, by where they happen.
///
/// `parent_state` accepts writes at an ancestor path (a broad write that
/// covers this subscription); `child_state` accepts writes at a descendant
/// path.
#[derive(Clone)]
pub struct DirectionFilter {
    pub this_state: bool,
    pub parent_state: bool,
    pub child_state: bool,
    /// Only accept changes at one of these paths.
    pub trigger_paths: Option<Vec<Path>>,
    /// Additional predicate, evaluated after the direction checks.
    pub condition: Option<Condition>,
}

impl Default for DirectionFilter {
    fn default() -> Self {
        Self {
            this_state: true,
            parent_state: false,
            child_state: true,
            trigger_paths: None,
            condition: None,
        }
    }
}

impl DirectionFilter {
    /// Accept changes from every direction.
    pub fn all() -> Self {
        Self {
            parent_state: true,
            ..Default::default()
        }
    }

    /// Accept only writes at exactly the subscribed path.
    pub fn this_only() -> Self {
        Self {
            this_state: true,
            parent_state: false,
            child_state: false,
            ..Default::default()
        }
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ChangeArgs) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_trigger_paths(mut self, paths: Vec<Path>) -> Self {
        self.trigger_paths = Some(paths);
        self
    }

    fn allows(&self, relation: Relation) -> bool {
        match relation {
            Relation::This => self.this_state,
            Relation::Ancestor => self.child_state,
            Relation::Descendant => self.parent_state,
        }
    }

    /// Check a change delivered to a subscriber in `relation` to it.
    pub fn accepts(&self, relation: Relation, args: &ChangeArgs) -> bool {
        if !self.allows(relation) {
            return false;
        }

        if let Some(ref paths) = self.trigger_paths {
            if !paths.contains(&args.path) {
                return false;
            }
        }

        self.condition.as_ref().map_or(true, |condition| condition(args))
    }
}

impl fmt::Debug for DirectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionFilter")
            .field("this_state", &self.this_state)
            .field("parent_state", &self.parent_state)
            .field("child_state", &self.child_state)
            .field("trigger_paths", &self.trigger_paths)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// Per-subscription filter.
#[derive(Clone, Debug)]
pub enum SubscriptionFilter {
    /// Never deliver; every eligible change is reported as skipped.
    Never,
    /// Deliver every structurally eligible change.
    Always,
    Directions(DirectionFilter),
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        SubscriptionFilter::Directions(DirectionFilter::default())
    }
}

impl SubscriptionFilter {
    pub fn accepts(&self, relation: Relation, args: &ChangeArgs) -> bool {
        match self {
            SubscriptionFilter::Never => false,
            SubscriptionFilter::Always => true,
            SubscriptionFilter::Directions(filter) => filter.accepts(relation, args),
        }
    }
}

impl From<DirectionFilter> for SubscriptionFilter {
    fn from(filter: DirectionFilter) -> Self {
        SubscriptionFilter::Directions(filter)
    }
}

/// Which subscribers a write considers at all.
///
/// Field names are from the writer's point of view: `ancestors` reaches
/// subscribers above the written path, `descendants` those below it.
#[derive(Clone)]
pub struct UpdateScope {
    pub this_path: bool,
    pub ancestors: bool,
    pub descendants: bool,
    /// Only deliver to subscriptions registered at one of these paths.
    pub subscriber_paths: Option<Vec<Path>>,
    /// Short-circuits the whole notification when it returns false.
    pub condition: Option<Condition>,
}

impl Default for UpdateScope {
    fn default() -> Self {
        Self {
            this_path: true,
            ancestors: true,
            descendants: true,
            subscriber_paths: None,
            condition: None,
        }
    }
}

impl UpdateScope {
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ChangeArgs) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_subscriber_paths(mut self, paths: Vec<Path>) -> Self {
        self.subscriber_paths = Some(paths);
        self
    }
}

impl fmt::Debug for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScope")
            .field("this_path", &self.this_path)
            .field("ancestors", &self.ancestors)
            .field("descendants", &self.descendants)
            .field("subscriber_paths", &self.subscriber_paths)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// Per-write notification filter.
#[derive(Clone, Debug, Default)]
pub enum UpdateFilter {
    /// Notify nobody.
    Silent,
    /// Consider this-path, ancestor and descendant subscribers.
    #[default]
    All,
    Scoped(UpdateScope),
}

impl UpdateFilter {
    /// Whether subscribers in `relation` to the change are considered.
    pub fn includes(&self, relation: Relation) -> bool {
        match self {
            UpdateFilter::Silent => false,
            UpdateFilter::All => true,
            UpdateFilter::Scoped(scope) => match relation {
                Relation::This => scope.this_path,
                Relation::Ancestor => scope.ancestors,
                Relation::Descendant => scope.descendants,
            },
        }
    }

    /// Global gate, evaluated once per notification.
    pub fn passes(&self, args: &ChangeArgs) -> bool {
        match self {
            UpdateFilter::Silent => false,
            UpdateFilter::All => true,
            UpdateFilter::Scoped(scope) => scope
                .condition
                .as_ref()
                .map_or(true, |condition| condition(args)),
        }
    }

    /// Whether a subscription registered at `path` may be delivered to.
    pub fn admits(&self, path: &Path) -> bool {
        match self {
            UpdateFilter::Scoped(UpdateScope {
                subscriber_paths: Some(paths),
                ..
            }) => paths.contains(path),
            _ => true,
        }
    }
}

impl From<UpdateScope> for UpdateFilter {
    fn from(scope: UpdateScope) -> Self {
        UpdateFilter::Scoped(scope)
    }
}

/// One subscriber's registered interest in one path.
pub struct Subscription {
    id: SubscriberId,
    path: Path,
    filter: SubscriptionFilter,
    on_update: UpdateCallback,
    on_update_skipped: Option<UpdateCallback>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    pub(crate) fn on_update(&self, args: &ChangeArgs) -> CallbackResult {
        (self.on_update)(args, self)
    }

    pub(crate) fn on_update_skipped(&self, args: &ChangeArgs) -> CallbackResult {
        match self.on_update_skipped {
            Some(ref callback) => callback(args, self),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("filter", &self.filter)
            .field("on_update_skipped", &self.on_update_skipped.is_some())
            .finish()
    }
}

/// Builder for a subscription, consumed by `Store::subscribe`.
#[derive(Clone)]
pub struct SubscriptionConfig {
    pub path: String,
    pub filter: SubscriptionFilter,
    pub on_update: UpdateCallback,
    pub on_update_skipped: Option<UpdateCallback>,
}

impl SubscriptionConfig {
    /// Subscribe at `path` with the default direction filter.
    pub fn new<F>(path: impl Into<String>, on_update: F) -> Self
    where
        F: Fn(&ChangeArgs, &Subscription) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            filter: SubscriptionFilter::default(),
            on_update: Arc::new(on_update),
            on_update_skipped: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<SubscriptionFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Add a condition to the current filter.
    ///
    /// `Always` becomes an all-directions filter carrying the condition;
    /// `Never` stays `Never`.
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ChangeArgs) -> bool + Send + Sync + 'static,
    {
        self.filter = match self.filter {
            SubscriptionFilter::Never => SubscriptionFilter::Never,
            SubscriptionFilter::Always => DirectionFilter::all().with_condition(condition).into(),
            SubscriptionFilter::Directions(filter) => filter.with_condition(condition).into(),
        };
        self
    }

    /// Add a prebuilt condition, such as one from `Store::selector_condition`.
    pub fn condition_arc(self, condition: Condition) -> Self {
        self.condition(move |args| condition(args))
    }

    pub fn on_skipped<F>(mut self, on_update_skipped: F) -> Self
    where
        F: Fn(&ChangeArgs, &Subscription) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_update_skipped = Some(Arc::new(on_update_skipped));
        self
    }

    pub(crate) fn build(self, id: SubscriberId) -> Result<Subscription> {
        Ok(Subscription {
            id,
            path: Path::parse(&self.path)?,
            filter: self.filter,
            on_update: self.on_update,
            on_update_skipped: self.on_update_skipped,
        })
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("path", &self.path)
            .field("filter", &self.filter)
            .finish()
    }
}
