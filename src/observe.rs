//! Change notification plumbing.
//!
//! [`Observers`] holds callbacks keyed by a monotonically increasing id.
//! [`Observers::subscribe`] returns a [`Subscription`], an RAII guard that
//! removes its callback when dropped. Whoever owns the guard owns the
//! subscription; there is no way to leak one by forgetting to unsubscribe.
//!
//! Callbacks are invoked in registration order, after the internal lock has
//! been released, so a callback may freely subscribe, unsubscribe, or trigger
//! further notifications.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    entries: Vec<(u64, Callback<E>)>,
}

/// A list of change callbacks for events of type `E`.
pub struct Observers<E> {
    inner: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Observers<E> {
    /// Create an empty observer list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `callback`. It stays registered until the returned guard drops.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));
        drop(registry);

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Deliver `event` to every current subscriber.
    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// Whether there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &lock(&self.inner).entries.len())
            .finish()
    }
}

fn lock<E>(inner: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard for a registered callback. Unsubscribes on drop.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
