//! Observer registries.

use std::sync::{Arc, Mutex};

use crate::refresher::RefreshAttemptResult;

/// Receives the routes of every attempt the result processor lets through.
pub trait RouteRefreshObserver: Send + Sync {
    fn on_routes_refreshed(&self, result: &RefreshAttemptResult);
}

/// Registered observers, notified from a snapshot taken outside the lock so an
/// observer may (un)register while being notified.
pub struct ObserverRegistry<T: ?Sized> {
    observers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> ObserverRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same observer twice is a no-op.
    pub fn register(&self, observer: Arc<T>) {
        let mut observers = self.lock();
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Returns whether the observer was registered.
    pub fn unregister(&self, observer: &Arc<T>) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    pub fn unregister_all(&self) {
        self.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<T>>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
