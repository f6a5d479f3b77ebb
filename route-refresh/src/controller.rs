//! Entry point tying planned and immediate refreshes together.

use std::sync::Arc;

use crate::client::RouteRefreshClient;
use crate::ev::EvRefreshDataProvider;
use crate::expiration::RouteExpirationTracker;
use crate::immediate::{ImmediateRouteRefreshController, RouteRefreshCallback};
use crate::observers::RouteRefreshObserver;
use crate::options::{OptionsError, RouteRefreshOptions};
use crate::planned::{PlannedRouteRefreshController, RoutesRefreshAttemptListener};
use crate::processor::RouteRefresherResultProcessor;
use crate::progress::RouteProgressProvider;
use crate::refresher::RouteRefresher;
use crate::route::Route;
use crate::single_flight::RouteRefresherExecutor;
use crate::stale::{system_date_provider, DateProvider, ExpiringDataRemover};
use crate::state::{RouteRefreshStateHolder, RouteRefreshStatesObserver};

/// Keeps the routes of a navigation session fresh.
///
/// Planned refreshes run every [`RouteRefreshOptions::interval`]; an immediate refresh
/// pauses them and, if it refreshed nothing, lets them continue. Both share one
/// executor, so at most one refresh request is in flight.
///
/// Must be created and used inside a tokio runtime.
pub struct RouteRefreshController {
    planned: Arc<PlannedRouteRefreshController>,
    immediate: ImmediateRouteRefreshController,
    state_holder: Arc<RouteRefreshStateHolder>,
    processor: Arc<RouteRefresherResultProcessor>,
    expiration: Arc<RouteExpirationTracker>,
}

impl RouteRefreshController {
    pub fn builder(
        options: RouteRefreshOptions,
        client: Arc<dyn RouteRefreshClient>,
        progress: Arc<dyn RouteProgressProvider>,
    ) -> RouteRefreshControllerBuilder {
        RouteRefreshControllerBuilder {
            options,
            client,
            progress,
            ev_data: None,
            attempt_listener: None,
            date_provider: None,
        }
    }

    /// Sets the routes refreshed periodically. Empty `routes` stop planned refreshes.
    pub fn request_planned_route_refresh(&self, routes: Vec<Route>) {
        self.expiration.retain(&routes);
        self.processor.reset();
        self.planned.start_routes_refreshing(routes);
    }

    /// Refreshes `routes` now. Planned refreshes are paused meanwhile and resume only
    /// if nothing was refreshed; a successful result becomes the new planned baseline
    /// through the caller, who is expected to set the refreshed routes.
    pub fn request_immediate_route_refresh(
        &self,
        routes: Vec<Route>,
        callback: Option<RouteRefreshCallback>,
    ) {
        if routes.is_empty() {
            return;
        }
        self.planned.pause();
        let planned = self.planned.clone();
        self.immediate.request_routes_refresh(
            routes,
            Box::new(move |result| {
                if matches!(&result, Ok(result) if !result.succeeded()) {
                    planned.resume();
                }
                if let Some(callback) = callback {
                    callback(result);
                }
            }),
        );
    }

    pub fn pause_route_refreshes(&self) {
        self.planned.pause();
    }

    pub fn resume_route_refreshes(&self) {
        self.planned.resume();
    }

    pub fn register_route_refresh_observer(&self, observer: Arc<dyn RouteRefreshObserver>) {
        self.processor.register_observer(observer);
    }

    pub fn unregister_route_refresh_observer(&self, observer: &Arc<dyn RouteRefreshObserver>) {
        self.processor.unregister_observer(observer);
    }

    /// The observer immediately gets the current state unless nothing happened yet.
    pub fn register_route_refresh_state_observer(
        &self,
        observer: Arc<dyn RouteRefreshStatesObserver>,
    ) {
        self.state_holder.register_observer(observer);
    }

    pub fn unregister_route_refresh_state_observer(
        &self,
        observer: &Arc<dyn RouteRefreshStatesObserver>,
    ) {
        self.state_holder.unregister_observer(observer);
    }

    /// Unregisters every observer and stops all refreshes without notifying anyone.
    pub fn destroy(&self) {
        self.processor.unregister_all_observers();
        self.state_holder.unregister_all_observers();
        self.planned.destroy();
        self.immediate.cancel();
    }
}

/// Dropping is as silent as [`destroy`](RouteRefreshController::destroy).
impl Drop for RouteRefreshController {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub struct RouteRefreshControllerBuilder {
    options: RouteRefreshOptions,
    client: Arc<dyn RouteRefreshClient>,
    progress: Arc<dyn RouteProgressProvider>,
    ev_data: Option<Arc<EvRefreshDataProvider>>,
    attempt_listener: Option<Arc<dyn RoutesRefreshAttemptListener>>,
    date_provider: Option<DateProvider>,
}

impl RouteRefreshControllerBuilder {
    pub fn ev_data_provider(mut self, ev_data: Arc<EvRefreshDataProvider>) -> Self {
        self.ev_data = Some(ev_data);
        self
    }

    pub fn attempt_listener(mut self, listener: Arc<dyn RoutesRefreshAttemptListener>) -> Self {
        self.attempt_listener = Some(listener);
        self
    }

    /// Wall clock used to expire incidents. Defaults to the system clock.
    pub fn date_provider(mut self, date_provider: DateProvider) -> Self {
        self.date_provider = Some(date_provider);
        self
    }

    pub fn build(self) -> Result<RouteRefreshController, OptionsError> {
        self.options.validate()?;
        let options = self.options;

        let state_holder = Arc::new(RouteRefreshStateHolder::new());
        let processor = Arc::new(RouteRefresherResultProcessor::new(
            state_holder.clone(),
            ExpiringDataRemover::new(self.date_provider.unwrap_or_else(system_date_provider)),
            options.stale_data_timeout(),
        ));
        let refresher = RouteRefresher::new(
            self.client,
            self.progress,
            self.ev_data.unwrap_or_default(),
        );
        let expiration = refresher.expiration_tracker().clone();
        let executor = RouteRefresherExecutor::new(refresher);
        let planned = Arc::new(PlannedRouteRefreshController::new(
            executor.clone(),
            state_holder.clone(),
            processor.clone(),
            self.attempt_listener.clone(),
            options.interval(),
            options.request_timeout(),
            options.max_retries(),
        ));
        let immediate = ImmediateRouteRefreshController::new(
            executor,
            state_holder.clone(),
            processor.clone(),
            self.attempt_listener,
            options.request_timeout(),
        );

        Ok(RouteRefreshController {
            planned,
            immediate,
            state_holder,
            processor,
            expiration,
        })
    }
}
