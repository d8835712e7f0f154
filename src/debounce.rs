//! Trailing-edge debouncing of sync triggers
//!
//! Bursts of triggers ("save all", watcher storms) collapse into a single
//! invocation once the quiet window has passed without a newer trigger. The
//! invocation receives the argument of the last trigger.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Quiet window used for save and watch triggers
pub const QUIET_WINDOW: Duration = Duration::from_millis(100);

/// One debounce window shared by every trigger
pub struct DebounceGate<F> {
    inner: KeyedDebounceGate<(), F>,
}

impl<F> DebounceGate<F> {
    pub fn new(window: Duration, action: F) -> Self {
        Self {
            inner: KeyedDebounceGate::new(window, action),
        }
    }

    /// Register a trigger.
    ///
    /// The returned task resolves to `true` if this trigger was the one that
    /// ran the action, `false` if a newer trigger superseded it.
    pub fn trigger<T, Fut>(&self, arg: T) -> JoinHandle<bool>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.trigger((), arg)
    }
}

/// Independent debounce windows per key, e.g. one per saved file
pub struct KeyedDebounceGate<K, F> {
    window: Duration,
    next_ticket: Arc<AtomicU64>,
    latest: Arc<Mutex<HashMap<K, u64>>>,
    action: Arc<F>,
}

impl<K, F> KeyedDebounceGate<K, F> {
    pub fn new(window: Duration, action: F) -> Self {
        Self {
            window,
            next_ticket: Arc::new(AtomicU64::new(0)),
            latest: Arc::new(Mutex::new(HashMap::new())),
            action: Arc::new(action),
        }
    }

    /// Register a trigger for `key`; only the last trigger per key in a
    /// window runs the action.
    pub fn trigger<T, Fut>(&self, key: K, arg: T) -> JoinHandle<bool>
    where
        K: Eq + Hash + Clone + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.latest.clone();
        latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), ticket);
        let action = self.action.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut latest = latest.lock().unwrap_or_else(PoisonError::into_inner);
                if latest.get(&key) != Some(&ticket) {
                    return false;
                }
                latest.remove(&key);
            }
            action(arg).await;
            true
        })
    }
}
