//! Decides which attempt results reach refresh observers.
//!
//! Successful results always go through. Failed results are hidden for the stale-data
//! timeout after the last success (or reset); after that the routes are stripped of
//! expired congestion and incidents and observers get the stripped routes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::observers::{ObserverRegistry, RouteRefreshObserver};
use crate::refresher::RefreshAttemptResult;
use crate::stale::ExpiringDataRemover;
use crate::state::RouteRefreshStateHolder;
use crate::LOG_CATEGORY;

/// Receives the result of every finished refresh attempt.
pub trait RouteRefresherListener: Send + Sync {
    fn on_routes_refreshed(&self, result: RefreshAttemptResult);
}

pub struct RouteRefresherResultProcessor {
    state_holder: Arc<RouteRefreshStateHolder>,
    observers: ObserverRegistry<dyn RouteRefreshObserver>,
    remover: ExpiringDataRemover,
    stale_data_timeout: Duration,
    last_refresh_time: Mutex<Instant>,
}

impl RouteRefresherResultProcessor {
    pub fn new(
        state_holder: Arc<RouteRefreshStateHolder>,
        remover: ExpiringDataRemover,
        stale_data_timeout: Duration,
    ) -> Self {
        Self {
            state_holder,
            observers: ObserverRegistry::new(),
            remover,
            stale_data_timeout,
            last_refresh_time: Mutex::new(Instant::now()),
        }
    }

    /// Restarts the staleness clock, e.g. when new routes are set.
    pub fn reset(&self) {
        *self.lock() = Instant::now();
    }

    pub fn register_observer(&self, observer: Arc<dyn RouteRefreshObserver>) {
        self.observers.register(observer);
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn RouteRefreshObserver>) {
        self.observers.unregister(observer);
    }

    pub fn unregister_all_observers(&self) {
        self.observers.unregister_all();
    }

    fn notify(&self, result: &RefreshAttemptResult) {
        for observer in self.observers.snapshot() {
            observer.on_routes_refreshed(result);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_refresh_time.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RouteRefresherListener for RouteRefresherResultProcessor {
    fn on_routes_refreshed(&self, result: RefreshAttemptResult) {
        let now = Instant::now();
        if result.succeeded() {
            *self.lock() = now;
            self.notify(&result);
            return;
        }

        let last = *self.lock();
        if now.duration_since(last) < self.stale_data_timeout {
            return;
        }
        let stripped = self.remover.remove_expiring_data_from_routes(&result);
        if stripped == result {
            return;
        }
        tracing::info!(category = LOG_CATEGORY, "removed expired data from routes");
        *self.lock() = now;
        self.state_holder.on_cleared_expired();
        self.notify(&stripped);
    }
}
