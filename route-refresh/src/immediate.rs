//! One-off refresh triggered from outside the planned cycle.

use std::sync::Arc;
use std::time::Duration;

use crate::error::RefreshError;
use crate::planned::RoutesRefreshAttemptListener;
use crate::processor::RouteRefresherListener;
use crate::refresher::RefreshAttemptResult;
use crate::route::Route;
use crate::scheduler::{Delay, DelayScheduler};
use crate::single_flight::RouteRefresherExecutor;
use crate::state::RouteRefreshStateHolder;
use crate::LOG_CATEGORY;

/// Receives the outcome of an immediate refresh: the attempt result, or the reason
/// there is none (e.g. a newer request superseded it).
pub type RouteRefreshCallback = Box<dyn FnOnce(Result<RefreshAttemptResult, RefreshError>) + Send>;

pub struct ImmediateRouteRefreshController {
    executor: RouteRefresherExecutor,
    scheduler: DelayScheduler,
    state_holder: Arc<RouteRefreshStateHolder>,
    listener: Arc<dyn RouteRefresherListener>,
    attempt_listener: Option<Arc<dyn RoutesRefreshAttemptListener>>,
    request_timeout: Duration,
}

/// Reports a cancel unless disarmed, i.e. when the request task is dropped mid-way.
struct CancelGuard {
    state_holder: Option<Arc<RouteRefreshStateHolder>>,
}

impl CancelGuard {
    fn disarm(mut self) {
        self.state_holder = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(state_holder) = self.state_holder.take() {
            state_holder.on_cancel();
        }
    }
}

impl ImmediateRouteRefreshController {
    pub fn new(
        executor: RouteRefresherExecutor,
        state_holder: Arc<RouteRefreshStateHolder>,
        listener: Arc<dyn RouteRefresherListener>,
        attempt_listener: Option<Arc<dyn RoutesRefreshAttemptListener>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            scheduler: DelayScheduler::new(request_timeout),
            state_holder,
            listener,
            attempt_listener,
            request_timeout,
        }
    }

    /// Refreshes `routes` as soon as the executor is free. Empty `routes` are ignored
    /// and `callback` is not called.
    pub fn request_routes_refresh(&self, routes: Vec<Route>, callback: RouteRefreshCallback) {
        if routes.is_empty() {
            tracing::info!(category = LOG_CATEGORY, "Routes are empty, nothing to refresh");
            return;
        }
        let executor = self.executor.clone();
        let state_holder = self.state_holder.clone();
        let listener = self.listener.clone();
        let attempt_listener = self.attempt_listener.clone();
        let timeout = self.request_timeout;

        self.scheduler.schedule(Delay::Immediate, async move {
            let guard = CancelGuard {
                state_holder: Some(state_holder.clone()),
            };
            let on_start = {
                let state_holder = state_holder.clone();
                move || state_holder.on_started()
            };
            let result = executor.execute_routes_refresh(routes, timeout, on_start).await;
            guard.disarm();

            match &result {
                Ok(result) => {
                    if let Some(attempt_listener) = &attempt_listener {
                        attempt_listener.on_routes_refresh_attempt_finished(result);
                    }
                    if result.succeeded() {
                        state_holder.on_success();
                    } else {
                        state_holder.on_failure(None);
                    }
                    listener.on_routes_refreshed(result.clone());
                }
                Err(e) => {
                    tracing::warn!(category = LOG_CATEGORY, "Route refresh on-demand error: {}", e);
                }
            }
            callback(result);
        });
    }

    /// Drops pending requests. Their callbacks are not called.
    pub fn cancel(&self) {
        self.scheduler.cancel_all();
    }
}
