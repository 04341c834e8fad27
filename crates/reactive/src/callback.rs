//! Subscription callbacks with optional weak targets.

use std::sync::{Arc, Weak};

/// Result of handing an event to a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The callback's target no longer exists; the event was not handled.
    Dead,
}

type Invoke<E> = dyn Fn(&E) -> Delivery + Send + Sync;

/// A shareable event handler.
///
/// [`Callback::new`] owns its closure. [`Callback::weak`] only holds a
/// `Weak` handle to its target, so a subscription never keeps an observer
/// alive; once the target is dropped the callback reports
/// [`Delivery::Dead`] and the manager retires the subscription.
pub struct Callback<E> {
    invoke: Arc<Invoke<E>>,
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self {
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<E: 'static> Callback<E> {
    /// Wraps a closure that is always alive.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self {
            invoke: Arc::new(move |event: &E| {
                f(event);
                Delivery::Delivered
            }),
        }
    }

    /// Calls `f` with `target` for as long as `target` is alive elsewhere.
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    /// use tessera_reactive::{Callback, Delivery, StateChange};
    /// use tessera_core::Value;
    ///
    /// let view = Arc::new(Mutex::new(Vec::new()));
    /// let callback = Callback::weak(&view, |view, change: &StateChange| {
    ///     view.lock().unwrap().push(change.path.clone());
    /// });
    ///
    /// let change = StateChange::new("ui.zoom", Value::from(1), Value::from(2));
    /// assert_eq!(callback.invoke(&change), Delivery::Delivered);
    /// drop(view);
    /// assert_eq!(callback.invoke(&change), Delivery::Dead);
    /// ```
    pub fn weak<T, F>(target: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &E) + Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(target);
        Self {
            invoke: Arc::new(move |event: &E| match target.upgrade() {
                Some(target) => {
                    f(&target, event);
                    Delivery::Delivered
                }
                None => Delivery::Dead,
            }),
        }
    }

    /// Hands `event` to the callback.
    #[inline]
    pub fn invoke(&self, event: &E) -> Delivery {
        (self.invoke)(event)
    }
}

impl<E: 'static, F> From<F> for Callback<E>
where
    F: Fn(&E) + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Callback::new(f)
    }
}

impl<E> core::fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Callback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_strong_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback: Callback<u32> = Callback::new(move |n: &u32| {
            count_clone.fetch_add(*n as usize, Ordering::SeqCst);
        });

        assert_eq!(callback.invoke(&2), Delivery::Delivered);
        assert_eq!(callback.clone().invoke(&3), Delivery::Delivered);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_weak_callback_does_not_own_target() {
        let target = Arc::new(AtomicUsize::new(0));
        let callback = Callback::weak(&target, |t: &AtomicUsize, n: &u32| {
            t.fetch_add(*n as usize, Ordering::SeqCst);
        });
        assert_eq!(Arc::strong_count(&target), 1);

        assert_eq!(callback.invoke(&4), Delivery::Delivered);
        assert_eq!(target.load(Ordering::SeqCst), 4);

        drop(target);
        assert_eq!(callback.invoke(&4), Delivery::Dead);
    }

    #[test]
    fn test_from_closure() {
        let callback: Callback<String> = (|_: &String| {}).into();
        assert_eq!(callback.invoke(&"x".to_string()), Delivery::Delivered);
    }
}
