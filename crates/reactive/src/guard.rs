//! RAII subscription handles.

use crate::manager::{Inner, SubscriptionManager};
use crate::subscription::SubscriptionId;
use std::sync::Weak;

/// Unsubscribes when dropped.
///
/// The guard holds only a weak handle to the manager; dropping a guard after
/// the manager is gone is a no-op.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    id: SubscriptionId,
    manager: Weak<Inner>,
    armed: bool,
}

impl SubscriptionGuard {
    pub(crate) fn new(manager: &SubscriptionManager, id: SubscriptionId) -> Self {
        Self {
            id,
            manager: manager.downgrade(),
            armed: true,
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribes now. Returns false if the subscription or the manager was
    /// already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.armed = false;
        self.release()
    }

    /// Disarms the guard, leaving the subscription registered.
    pub fn forget(mut self) -> SubscriptionId {
        self.armed = false;
        self.id
    }

    fn release(&self) -> bool {
        match self.manager.upgrade() {
            Some(inner) => SubscriptionManager::from_inner(inner).unsubscribe(self.id),
            None => false,
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.release();
        }
    }
}

impl core::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::StateChange;
    use tessera_core::Value;

    #[test]
    fn test_drop_unsubscribes() {
        let manager = SubscriptionManager::new();
        let id = manager.subscribe_to_path("a", |_| {});
        {
            let guard = manager.guard(id);
            assert_eq!(guard.id(), id);
            assert_eq!(manager.len(), 1);
        }
        assert!(manager.is_empty());
        assert_eq!(
            manager.notify_state_change([StateChange::new("a", Value::from(1), Value::from(2))]),
            0
        );
    }

    #[test]
    fn test_forget_keeps_subscription() {
        let manager = SubscriptionManager::new();
        let id = manager.guard(manager.subscribe_to_path("a", |_| {})).forget();
        assert!(manager.subscription_info(id).is_some());
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let manager = SubscriptionManager::new();
        let guard = manager.guard(manager.subscribe_to_path("a", |_| {}));
        let id = guard.id();
        assert!(manager.unsubscribe(id));
        assert!(!guard.unsubscribe());
    }

    #[test]
    fn test_guard_outlives_manager() {
        let manager = SubscriptionManager::new();
        let guard = manager.guard(manager.subscribe_to_path("a", |_| {}));
        drop(manager);
        assert!(!guard.unsubscribe());
    }
}
