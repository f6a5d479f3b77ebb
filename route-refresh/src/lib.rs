//! # Route Refresh
//!
//! Keeps the routes of a turn-by-turn navigation session up to date. Traffic
//! annotations (congestion, speed, duration) and incidents along a route age quickly;
//! this crate re-requests them from the routing service while the user drives, and
//! removes them once they are too old to trust.
//!
//! ## Design
//!
//! - **Planned refresh**: every `interval` the current routes are refreshed; failed
//!   attempts are retried silently a few times before the failure is reported.
//! - **Immediate refresh**: an on-demand refresh pauses the planned cycle and lets it
//!   continue only if nothing was refreshed.
//! - **Single flight**: both share one executor. At most one attempt runs; at most one
//!   waits, and a newer request supersedes the waiting one.
//! - **Stale data**: failures stay invisible for `stale_data_timeout` after the last
//!   success. Afterwards congestion ahead of the user becomes "unknown" and expired
//!   incidents are dropped.
//! - **Expiration**: a route whose refresh TTL ran out, or that the routing service
//!   invalidated, is reported as invalidated and not requested again.
//! - **Identity**: a refreshed route keeps its [`RouteId`]; routes are never dropped
//!   from a result, a route that could not be refreshed is returned unchanged.
//!
//! ## Main modules
//!
//! - [`controller`]: [`RouteRefreshController`], the entry point.
//! - [`planned`] / [`immediate`]: the two ways a refresh is triggered.
//! - [`single_flight`]: [`RouteRefresherExecutor`].
//! - [`refresher`]: [`RouteRefresher`] and [`RefreshAttemptResult`].
//! - [`state`]: lifecycle states ([`STARTED`], [`FINISHED_SUCCESS`], ...) and
//!   [`RouteRefreshStatesObserver`].
//! - [`processor`] / [`stale`]: stale-data handling.
//! - [`expiration`]: routes the routing service no longer refreshes.
//! - [`client`] / [`progress`] / [`ev`]: what the host application provides.
//! - [`options`]: [`RouteRefreshOptions`], loadable from config files and environment.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use route_refresh::{
//!     ProgressTracker, Route, RouteRefreshClient, RouteRefreshController, RouteRefreshOptions,
//!     RouteRefreshRequest, RouterRefreshError,
//! };
//!
//! struct Service;
//!
//! #[async_trait]
//! impl RouteRefreshClient for Service {
//!     async fn refresh_route(
//!         &self,
//!         route: &Route,
//!         _request: &RouteRefreshRequest,
//!     ) -> Result<Route, RouterRefreshError> {
//!         Ok(route.clone())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let progress = Arc::new(ProgressTracker::new());
//! let controller =
//!     RouteRefreshController::builder(RouteRefreshOptions::load("navigation", None)?, Arc::new(Service), progress.clone())
//!         .build()?;
//! let route = Route::from_json(r#"{"request_uuid": "abc", "options": {"enable_refresh": true}}"#)?;
//! progress.on_route_progress(route.id().clone(), Default::default());
//! controller.request_planned_route_refresh(vec![route]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod controller;
pub mod diff;
pub mod error;
pub mod ev;
pub mod expiration;
pub mod immediate;
pub mod observers;
pub mod options;
pub mod planned;
pub mod processor;
pub mod progress;
pub mod refresher;
pub mod retry;
pub mod route;
pub mod scheduler;
pub mod single_flight;
pub mod stale;
pub mod state;
pub mod validator;

/// Value of the `category` field on every log event of this crate.
pub const LOG_CATEGORY: &str = "RouteRefreshController";

pub use client::{RouteRefreshClient, RouteRefreshRequest, RouterRefreshError};
pub use controller::{RouteRefreshController, RouteRefreshControllerBuilder};
pub use diff::build_route_diffs;
pub use error::RefreshError;
pub use ev::EvRefreshDataProvider;
pub use expiration::RouteExpirationTracker;
pub use immediate::{ImmediateRouteRefreshController, RouteRefreshCallback};
pub use observers::{ObserverRegistry, RouteRefreshObserver};
pub use options::{OptionsError, RouteRefreshOptions};
pub use planned::{PlannedRefreshPhase, PlannedRouteRefreshController, RoutesRefreshAttemptListener};
pub use processor::{RouteRefresherListener, RouteRefresherResultProcessor};
pub use progress::{ProgressTracker, RouteProgressData, RouteProgressProvider};
pub use refresher::{RefreshAttemptResult, RouteRefreshOutcome, RouteRefreshStatus, RouteRefresher};
pub use retry::RetryStrategy;
pub use route::{
    Incident, LegAnnotation, MaxSpeed, Route, RouteId, RouteLeg, RouteOptions, UNKNOWN_CONGESTION,
};
pub use scheduler::{Delay, DelayScheduler, Delayer};
pub use single_flight::RouteRefresherExecutor;
pub use stale::{system_date_provider, DateProvider, ExpiringDataRemover};
pub use state::{
    RouteRefreshState, RouteRefreshStateHolder, RouteRefreshStateResult,
    RouteRefreshStatesObserver, CANCELED, CLEARED_EXPIRED, FINISHED_FAILED, FINISHED_SUCCESS,
    STARTED,
};
pub use validator::{join_validation_errors, validate_route, RouteValidation};
