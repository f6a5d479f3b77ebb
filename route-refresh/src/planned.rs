//! Periodic refresh of the current route set.
//!
//! Every `interval` the remembered routes are refreshed. Failed attempts are retried
//! silently up to `max_retries` times before the failure is reported; after any
//! reported outcome a new cycle starts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::processor::RouteRefresherListener;
use crate::refresher::RefreshAttemptResult;
use crate::retry::RetryStrategy;
use crate::route::Route;
use crate::scheduler::{Delay, DelayScheduler};
use crate::single_flight::RouteRefresherExecutor;
use crate::state::RouteRefreshStateHolder;
use crate::validator::{join_validation_errors, validate_route};
use crate::LOG_CATEGORY;

/// Sees every finished attempt, retries included, before any other processing.
pub trait RoutesRefreshAttemptListener: Send + Sync {
    fn on_routes_refresh_attempt_finished(&self, result: &RefreshAttemptResult);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedRefreshPhase {
    /// No routes to refresh.
    Inactive,
    /// Waiting for the next attempt.
    Scheduled,
    /// An attempt was handed to the executor.
    AwaitingRefresh,
    Paused,
}

enum Outcome {
    Succeeded,
    Retry,
    Failed,
}

struct PlannedState {
    routes: Vec<Route>,
    paused: bool,
    phase: PlannedRefreshPhase,
    retry: RetryStrategy,
    job: Option<CancellationToken>,
    // Bumped whenever the current job is replaced; stale attempts compare against it.
    generation: u64,
}

struct Inner {
    executor: RouteRefresherExecutor,
    scheduler: DelayScheduler,
    state_holder: Arc<RouteRefreshStateHolder>,
    listener: Arc<dyn RouteRefresherListener>,
    attempt_listener: Option<Arc<dyn RoutesRefreshAttemptListener>>,
    request_timeout: Duration,
    state: Mutex<PlannedState>,
}

pub struct PlannedRouteRefreshController {
    inner: Arc<Inner>,
}

impl PlannedRouteRefreshController {
    pub fn new(
        executor: RouteRefresherExecutor,
        state_holder: Arc<RouteRefreshStateHolder>,
        listener: Arc<dyn RouteRefresherListener>,
        attempt_listener: Option<Arc<dyn RoutesRefreshAttemptListener>>,
        interval: Duration,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                scheduler: DelayScheduler::new(interval),
                state_holder,
                listener,
                attempt_listener,
                request_timeout,
                state: Mutex::new(PlannedState {
                    routes: Vec::new(),
                    paused: false,
                    phase: PlannedRefreshPhase::Inactive,
                    retry: RetryStrategy::new(max_retries),
                    job: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Replaces the refreshed route set and (re)starts the cycle. Clears a pause.
    ///
    /// If the new set shares a route with the old one the running interval continues,
    /// so a rerouted or re-ordered set is not refreshed later than planned.
    pub fn start_routes_refreshing(&self, routes: Vec<Route>) {
        let canceled = {
            let mut state = self.inner.lock();
            state.paused = false;
            state.cancel_job()
        };
        if canceled {
            self.inner.state_holder.on_cancel();
        }

        if routes.is_empty() {
            self.inner.forget_routes();
            self.inner.state_holder.reset();
            tracing::info!(category = LOG_CATEGORY, "Routes are empty, nothing to refresh");
            return;
        }

        let validations: Vec<_> = routes.iter().map(validate_route).collect();
        if !validations.iter().any(|v| v.is_valid()) {
            let message = format!(
                "No routes which could be refreshed. {}",
                join_validation_errors(routes.iter().zip(validations.iter()))
            );
            tracing::info!(category = LOG_CATEGORY, "{}", message);
            self.inner.state_holder.on_started();
            self.inner.state_holder.on_failure(Some(message));
            self.inner.state_holder.reset();
            self.inner.forget_routes();
            return;
        }

        let mut state = self.inner.lock();
        let continues_cycle = routes
            .iter()
            .any(|route| state.routes.iter().any(|old| old.id() == route.id()));
        state.routes = routes;
        state.retry.reset();
        let delay = if continues_cycle {
            Delay::Resume
        } else {
            Delay::Interval
        };
        Inner::schedule(&self.inner, &mut state, delay, true);
    }

    /// Stops the cycle until [`resume`](Self::resume). An attempt in progress is
    /// abandoned and reported as canceled.
    pub fn pause(&self) {
        let canceled = {
            let mut state = self.inner.lock();
            if state.paused {
                return;
            }
            state.paused = true;
            state.phase = PlannedRefreshPhase::Paused;
            state.cancel_job()
        };
        if canceled {
            self.inner.state_holder.on_cancel();
        }
    }

    /// Re-arms a paused cycle for the remainder of its interval. A cycle that still
    /// has retries left continues counting them; otherwise a fresh cycle starts.
    pub fn resume(&self) {
        let mut state = self.inner.lock();
        if !state.paused {
            return;
        }
        state.paused = false;
        if state.routes.is_empty() {
            state.phase = PlannedRefreshPhase::Inactive;
            return;
        }
        if !state.retry.should_retry() {
            state.retry.reset();
        }
        Inner::schedule(&self.inner, &mut state, Delay::Resume, true);
    }

    pub fn phase(&self) -> PlannedRefreshPhase {
        self.inner.lock().phase
    }

    /// Cancels everything without reporting it.
    pub fn destroy(&self) {
        {
            let mut state = self.inner.lock();
            state.cancel_job();
            state.routes.clear();
            state.phase = PlannedRefreshPhase::Inactive;
        }
        self.inner.scheduler.cancel_all();
        self.inner.scheduler.delayer().reset();
    }
}

impl PlannedState {
    /// Returns whether a live job was canceled.
    fn cancel_job(&mut self) -> bool {
        self.generation += 1;
        match self.job.take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, PlannedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn forget_routes(&self) {
        let mut state = self.lock();
        state.routes.clear();
        state.phase = PlannedRefreshPhase::Inactive;
    }

    fn schedule(inner: &Arc<Inner>, state: &mut PlannedState, delay: Delay, notify_start: bool) {
        state.cancel_job();
        let generation = state.generation;
        let attempt = inner.clone();
        state.job = Some(inner.scheduler.schedule(delay, async move {
            attempt.run_attempt(generation, notify_start).await;
        }));
        state.phase = PlannedRefreshPhase::Scheduled;
    }

    async fn run_attempt(self: Arc<Self>, generation: u64, notify_start: bool) {
        let routes = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.phase = PlannedRefreshPhase::AwaitingRefresh;
            state.routes.clone()
        };
        let state_holder = self.state_holder.clone();
        let start_callback = move || {
            if notify_start {
                state_holder.on_started();
            }
        };
        match self
            .executor
            .execute_routes_refresh(routes, self.request_timeout, start_callback)
            .await
        {
            Ok(result) => self.on_attempt_finished(generation, result),
            Err(e) => {
                tracing::warn!(category = LOG_CATEGORY, "Planned route refresh error: {}", e);
            }
        }
    }

    fn on_attempt_finished(self: &Arc<Self>, generation: u64, result: RefreshAttemptResult) {
        if self.lock().generation != generation {
            return;
        }
        if let Some(listener) = &self.attempt_listener {
            listener.on_routes_refresh_attempt_finished(&result);
        }
        let outcome = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            let outcome = if result.succeeded() {
                state.retry.reset();
                state.routes = result.routes();
                Outcome::Succeeded
            } else if result.any_request_failed() && state.retry.should_retry() {
                state.retry.on_next_attempt();
                Outcome::Retry
            } else {
                state.retry.reset();
                Outcome::Failed
            };
            let notify_start = !matches!(outcome, Outcome::Retry);
            Inner::schedule(self, &mut state, Delay::Interval, notify_start);
            outcome
        };

        match outcome {
            Outcome::Retry => {
                tracing::debug!(category = LOG_CATEGORY, "planned route refresh failed, retrying");
            }
            Outcome::Succeeded => {
                self.state_holder.on_success();
                self.listener.on_routes_refreshed(result);
            }
            Outcome::Failed => {
                self.state_holder.on_failure(None);
                self.listener.on_routes_refreshed(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::{RouteRefreshClient, RouteRefreshRequest, RouterRefreshError};
    use crate::ev::EvRefreshDataProvider;
    use crate::progress::{ProgressTracker, RouteProgressData};
    use crate::refresher::RouteRefresher;
    use crate::route::RouteOptions;
    use crate::state::{
        RouteRefreshStateResult, RouteRefreshStatesObserver, CANCELED, FINISHED_FAILED,
        FINISHED_SUCCESS, STARTED,
    };

    const INTERVAL: Duration = Duration::from_secs(30);

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyClient {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RouteRefreshClient for FlakyClient {
        async fn refresh_route(
            &self,
            route: &Route,
            _request: &RouteRefreshRequest,
        ) -> Result<Route, RouterRefreshError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(RouterRefreshError::new("unavailable"))
            } else {
                Ok(route.clone())
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<RouteRefreshStateResult>>,
        results: Mutex<Vec<RefreshAttemptResult>>,
        attempts: AtomicUsize,
    }

    impl Recorder {
        fn states(&self) -> Vec<&'static str> {
            self.states.lock().unwrap().iter().map(|s| s.state).collect()
        }
    }

    impl RouteRefreshStatesObserver for Recorder {
        fn on_new_state(&self, result: &RouteRefreshStateResult) {
            self.states.lock().unwrap().push(result.clone());
        }
    }

    impl RouteRefresherListener for Recorder {
        fn on_routes_refreshed(&self, result: RefreshAttemptResult) {
            self.results.lock().unwrap().push(result);
        }
    }

    impl RoutesRefreshAttemptListener for Recorder {
        fn on_routes_refresh_attempt_finished(&self, _result: &RefreshAttemptResult) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn route(uuid: &str, enable_refresh: bool) -> Route {
        Route::new(
            Some(uuid.into()),
            0,
            RouteOptions {
                enable_refresh,
                electric: false,
            },
            vec![],
        )
    }

    fn controller(failures: usize, max_retries: u32) -> (PlannedRouteRefreshController, Arc<Recorder>, Arc<FlakyClient>) {
        let client = Arc::new(FlakyClient {
            failures,
            calls: AtomicUsize::new(0),
        });
        let tracker = Arc::new(ProgressTracker::new());
        tracker.on_route_progress(route("req", true).id().clone(), RouteProgressData::default());
        let executor = RouteRefresherExecutor::new(RouteRefresher::new(
            client.clone(),
            tracker,
            Arc::new(EvRefreshDataProvider::with_initial(HashMap::new())),
        ));
        let holder = Arc::new(RouteRefreshStateHolder::new());
        let recorder = Arc::new(Recorder::default());
        holder.register_observer(recorder.clone());
        let controller = PlannedRouteRefreshController::new(
            executor,
            holder,
            recorder.clone(),
            Some(recorder.clone()),
            INTERVAL,
            INTERVAL,
            max_retries,
        );
        (controller, recorder, client)
    }

    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_after_interval_then_periodic() {
        let (controller, recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![route("req", true)]);
        assert_eq!(controller.phase(), PlannedRefreshPhase::Scheduled);

        advance(INTERVAL - Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        advance(Duration::from_millis(2)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.states(), vec![STARTED, FINISHED_SUCCESS]);
        assert_eq!(recorder.results.lock().unwrap().len(), 1);

        advance(INTERVAL).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            recorder.states(),
            vec![STARTED, FINISHED_SUCCESS, STARTED, FINISHED_SUCCESS]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_retried_silently_before_reporting() {
        let (controller, recorder, client) = controller(3, 2);
        controller.start_routes_refreshing(vec![route("req", true)]);

        advance(INTERVAL * 2 + Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.states(), vec![STARTED]);
        assert!(recorder.results.lock().unwrap().is_empty());

        advance(INTERVAL).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.states(), vec![STARTED, FINISHED_FAILED]);
        assert_eq!(recorder.results.lock().unwrap().len(), 1);
        assert_eq!(recorder.attempts.load(Ordering::SeqCst), 3);

        advance(INTERVAL).await;
        assert_eq!(
            recorder.states(),
            vec![STARTED, FINISHED_FAILED, STARTED, FINISHED_SUCCESS]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_routes_reset_silently() {
        let (controller, recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![]);
        advance(INTERVAL * 3).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(recorder.states().is_empty());
        assert_eq!(controller.phase(), PlannedRefreshPhase::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn all_invalid_routes_report_failure_and_reset() {
        let (controller, recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![route("a", false), route("b", false)]);

        let states = recorder.states.lock().unwrap().clone();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].state, STARTED);
        assert_eq!(states[1].state, FINISHED_FAILED);
        assert_eq!(
            states[1].message.as_deref(),
            Some(
                "No routes which could be refreshed. a#0 RouteOptions#enableRefresh is false. \
                 b#0 RouteOptions#enableRefresh is false"
            )
        );

        controller.pause();
        controller.resume();
        advance(INTERVAL * 2).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.states.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_resume_continues_remaining_interval() {
        let (controller, recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![route("req", true)]);

        advance(Duration::from_secs(10)).await;
        controller.pause();
        controller.pause();
        assert_eq!(controller.phase(), PlannedRefreshPhase::Paused);
        advance(Duration::from_secs(60)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(recorder.states().is_empty());

        controller.resume();
        advance(Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.states(), vec![STARTED, FINISHED_SUCCESS]);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_route_keeps_running_interval() {
        let (controller, _recorder, client) = controller(0, 2);
        let shared = route("req", true);
        controller.start_routes_refreshing(vec![shared.clone()]);
        advance(Duration::from_secs(20)).await;

        controller.start_routes_refreshing(vec![shared, route("other", true)]);
        advance(Duration::from_secs(10) + Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_route_set_restarts_interval() {
        let (controller, _recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![route("req", true)]);
        advance(Duration::from_secs(20)).await;

        controller.start_routes_refreshing(vec![route("other", true)]);
        advance(Duration::from_secs(20)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        advance(Duration::from_secs(10) + Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_after_start_reports_cancel() {
        struct Stuck;

        #[async_trait]
        impl RouteRefreshClient for Stuck {
            async fn refresh_route(
                &self,
                _route: &Route,
                _request: &RouteRefreshRequest,
            ) -> Result<Route, RouterRefreshError> {
                std::future::pending().await
            }
        }

        let tracker = Arc::new(ProgressTracker::new());
        tracker.on_route_progress(route("req", true).id().clone(), RouteProgressData::default());
        let executor = RouteRefresherExecutor::new(RouteRefresher::new(
            Arc::new(Stuck),
            tracker,
            Arc::new(EvRefreshDataProvider::new()),
        ));
        let holder = Arc::new(RouteRefreshStateHolder::new());
        let recorder = Arc::new(Recorder::default());
        holder.register_observer(recorder.clone());
        let controller = PlannedRouteRefreshController::new(
            executor,
            holder,
            recorder.clone(),
            None,
            INTERVAL,
            INTERVAL,
            2,
        );

        controller.start_routes_refreshing(vec![route("req", true)]);
        advance(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(controller.phase(), PlannedRefreshPhase::AwaitingRefresh);

        controller.pause();
        assert_eq!(recorder.states(), vec![STARTED, CANCELED]);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_is_silent() {
        let (controller, recorder, client) = controller(0, 2);
        controller.start_routes_refreshing(vec![route("req", true)]);
        controller.destroy();
        advance(INTERVAL * 2).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(recorder.states().is_empty());
    }
    #[tokio::test(start_paused = true)]
    async fn resume_without_owed_retry_rearms_remaining_interval() {
        let (controller, recorder, client) = controller(0, 0);
        controller.start_routes_refreshing(vec![route("req", true)]);

        advance(Duration::from_secs(10)).await;
        controller.pause();
        controller.resume();
        assert_eq!(controller.phase(), PlannedRefreshPhase::Scheduled);

        advance(Duration::from_secs(20) - Duration::from_millis(1)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        advance(Duration::from_millis(2)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.states(), vec![STARTED, FINISHED_SUCCESS]);
    }
}
