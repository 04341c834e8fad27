//! Subscription records.
//!
//! This module defines subscription ids, kinds and lifecycle states, and the
//! record the manager keeps for every registered subscription.

use crate::callback::Callback;
use crate::change::{SelectorChange, StateChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tessera_core::Value;

/// Unique identifier for a subscription, displayed as `sub-<n>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[inline]
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric id.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// How a subscription's path is matched against changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Exact path equality.
    Path,
    /// Glob pattern over the change path.
    Pattern,
    /// The path itself or anything below it.
    Deep,
    /// Selector output changes, by selector name.
    Selector,
    /// Every state change.
    Change,
}

impl SubscriptionType {
    pub const ALL: [SubscriptionType; 5] = [
        SubscriptionType::Path,
        SubscriptionType::Pattern,
        SubscriptionType::Deep,
        SubscriptionType::Selector,
        SubscriptionType::Change,
    ];
}

/// Lifecycle state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Active,
    /// Skipped by deliveries until resumed.
    Paused,
    /// Target gone or explicitly retired; removed by cleanup.
    Dead,
}

/// Predicate over a change's new value; deliveries it rejects are skipped.
pub type ValueFilter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The callback a subscription delivers to.
#[derive(Clone, Debug)]
pub(crate) enum Target {
    State(Callback<StateChange>),
    Selector(Callback<SelectorChange>),
}

/// Snapshot of one subscription's bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub subscription_type: SubscriptionType,
    pub path: String,
    pub state: SubscriptionState,
    pub created_at: SystemTime,
    pub last_notified: Option<SystemTime>,
    pub notification_count: u64,
}

/// A registered subscription.
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub kind: SubscriptionType,
    /// Exact path, glob pattern, path prefix, selector name or `*`.
    pub path: String,
    pub target: Target,
    pub filter: Option<ValueFilter>,
    pub state: SubscriptionState,
    pub created_at: SystemTime,
    pub last_notified: Option<SystemTime>,
    pub notification_count: u64,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        kind: SubscriptionType,
        path: String,
        target: Target,
        filter: Option<ValueFilter>,
    ) -> Self {
        Self {
            id,
            kind,
            path,
            target,
            filter,
            state: SubscriptionState::Active,
            created_at: SystemTime::now(),
            last_notified: None,
            notification_count: 0,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }

    /// Returns true if the filter (if any) accepts `value`.
    #[inline]
    pub fn accepts(&self, value: &Value) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(value))
    }

    /// Records a delivered notification.
    pub fn record_delivery(&mut self, at: SystemTime) {
        self.last_notified = Some(at);
        self.notification_count += 1;
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            subscription_type: self.kind,
            path: self.path.clone(),
            state: self.state,
            created_at: self.created_at,
            last_notified: self.last_notified,
            notification_count: self.notification_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_subscription(filter: Option<ValueFilter>) -> Subscription {
        Subscription::new(
            SubscriptionId::new(7),
            SubscriptionType::Path,
            "ui.zoom".into(),
            Target::State(Callback::new(|_: &StateChange| {})),
            filter,
        )
    }

    #[test]
    fn test_id_display() {
        assert_eq!(SubscriptionId::new(42).to_string(), "sub-42");
        assert_eq!(SubscriptionId::new(42).as_u64(), 42);
    }

    #[test]
    fn test_new_subscription_is_active() {
        let sub = path_subscription(None);
        assert!(sub.is_active());
        assert_eq!(sub.notification_count, 0);
        assert!(sub.last_notified.is_none());
    }

    #[test]
    fn test_filter() {
        let big: ValueFilter = Arc::new(|v: &Value| v.as_f64().is_some_and(|n| n > 1.0));
        let sub = path_subscription(Some(big));
        assert!(sub.accepts(&Value::from(2)));
        assert!(!sub.accepts(&Value::from(1)));
        assert!(path_subscription(None).accepts(&Value::Null));
    }

    #[test]
    fn test_record_delivery_and_info() {
        let mut sub = path_subscription(None);
        let now = SystemTime::now();
        sub.record_delivery(now);
        sub.record_delivery(now);

        let info = sub.info();
        assert_eq!(info.id, SubscriptionId::new(7));
        assert_eq!(info.subscription_type, SubscriptionType::Path);
        assert_eq!(info.notification_count, 2);
        assert_eq!(info.last_notified, Some(now));
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionType::Deep).unwrap();
        assert_eq!(json, "\"deep\"");
    }
}
