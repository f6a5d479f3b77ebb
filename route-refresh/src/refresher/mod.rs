//! One refresh attempt: every route of a set is refreshed concurrently.

mod result;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::client::{RouteRefreshClient, RouteRefreshRequest};
use crate::diff::build_route_diffs;
use crate::error::RefreshError;
use crate::ev::EvRefreshDataProvider;
use crate::expiration::RouteExpirationTracker;
use crate::progress::{RouteProgressData, RouteProgressProvider};
use crate::route::Route;
use crate::validator::{validate_route, RouteValidation};
use crate::LOG_CATEGORY;

pub use result::{RefreshAttemptResult, RouteRefreshOutcome, RouteRefreshStatus};

/// Sends one refresh request per route and collects the outcomes.
///
/// A route that cannot be refreshed (invalid, expired, timed out, failed) is kept
/// unchanged in the result; no route is ever dropped. Expired routes are not sent.
pub struct RouteRefresher {
    client: Arc<dyn RouteRefreshClient>,
    progress: Arc<dyn RouteProgressProvider>,
    ev_data: Arc<EvRefreshDataProvider>,
    expiration: Arc<RouteExpirationTracker>,
}

impl RouteRefresher {
    pub fn new(
        client: Arc<dyn RouteRefreshClient>,
        progress: Arc<dyn RouteProgressProvider>,
        ev_data: Arc<EvRefreshDataProvider>,
    ) -> Self {
        Self {
            client,
            progress,
            ev_data,
            expiration: Arc::new(RouteExpirationTracker::new()),
        }
    }

    pub fn expiration_tracker(&self) -> &Arc<RouteExpirationTracker> {
        &self.expiration
    }

    /// Refreshes `routes`, giving each request `timeout` to answer.
    pub async fn refresh(
        &self,
        routes: &[Route],
        timeout: Duration,
    ) -> Result<RefreshAttemptResult, RefreshError> {
        if routes.is_empty() {
            return Err(RefreshError::EmptyRoutes);
        }
        let progress = self.progress.routes_progress(routes).await?;
        if progress.len() != routes.len() {
            return Err(RefreshError::ProgressUnavailable(format!(
                "expected progress for {} routes, got {}",
                routes.len(),
                progress.len()
            )));
        }
        for route in routes {
            self.expiration.track(route);
        }
        let ev_data = self.ev_data.current();
        let outcomes = join_all(
            routes
                .iter()
                .zip(progress)
                .map(|(route, progress)| self.refresh_route(route, progress, &ev_data, timeout)),
        )
        .await;
        let result = RefreshAttemptResult::new(outcomes);
        for route_id in result.invalidated_route_ids() {
            self.expiration.invalidate(&route_id);
        }
        Ok(result)
    }

    async fn refresh_route(
        &self,
        route: &Route,
        progress: RouteProgressData,
        ev_data: &HashMap<String, String>,
        timeout: Duration,
    ) -> RouteRefreshOutcome {
        let kept = |status| RouteRefreshOutcome::new(route.clone(), progress, status);

        if let RouteValidation::Invalid(reason) = validate_route(route) {
            tracing::info!(
                category = LOG_CATEGORY,
                "route {} can't be refreshed because {}",
                route.id(),
                reason
            );
            return kept(RouteRefreshStatus::Invalid(reason));
        }
        if self.expiration.is_expired(route.id()) {
            tracing::info!(
                category = LOG_CATEGORY,
                "route {} will not be refreshed because it is invalidated",
                route.id()
            );
            return kept(RouteRefreshStatus::Invalidated);
        }

        let ev_data = if route.options().electric {
            ev_data.clone()
        } else {
            HashMap::new()
        };
        let request = RouteRefreshRequest::new(route, progress, ev_data);

        match tokio::time::timeout(timeout, self.client.refresh_route(route, &request)).await {
            Err(_) => {
                self.client.cancel_route_refresh(route.id());
                tracing::info!(
                    category = LOG_CATEGORY,
                    "Route refresh for route {} was cancelled after timeout",
                    route.id()
                );
                kept(RouteRefreshStatus::TimedOut)
            }
            Ok(Err(e)) => {
                tracing::error!(category = LOG_CATEGORY, "Route refresh error: {}", e.message);
                if let Some(ttl) = e.refresh_ttl {
                    self.expiration.update(route.id(), ttl);
                }
                if e.invalidates_route() {
                    kept(RouteRefreshStatus::Invalidated)
                } else {
                    kept(RouteRefreshStatus::Failed(e.message))
                }
            }
            Ok(Ok(refreshed)) if refreshed.id() != route.id() => {
                let reason = format!(
                    "refreshed route id {} does not match requested route {}",
                    refreshed.id(),
                    route.id()
                );
                tracing::error!(category = LOG_CATEGORY, "Route refresh error: {}", reason);
                kept(RouteRefreshStatus::Failed(reason))
            }
            Ok(Ok(refreshed)) => {
                tracing::info!(
                    category = LOG_CATEGORY,
                    "Received refreshed route {}",
                    refreshed.id()
                );
                if let Some(ttl) = refreshed.refresh_ttl() {
                    self.expiration.update(route.id(), ttl);
                }
                log_diffs(route, &refreshed, progress.leg_index);
                RouteRefreshOutcome::new(refreshed, progress, RouteRefreshStatus::Refreshed)
            }
        }
    }
}

fn log_diffs(old: &Route, new: &Route, current_leg_index: usize) {
    let diffs = build_route_diffs(old, new, current_leg_index);
    if diffs.is_empty() {
        tracing::info!(
            category = LOG_CATEGORY,
            "No changes in annotations for route {}",
            new.id()
        );
    }
    for diff in diffs {
        tracing::info!(category = LOG_CATEGORY, "{}", diff);
    }
}
