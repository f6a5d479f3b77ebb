//! Outcome of one refresh attempt over a route set.

use crate::progress::RouteProgressData;
use crate::route::{Route, RouteId};

/// What happened to one route during an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRefreshStatus {
    Refreshed,
    /// The routing service answered with an error.
    Failed(String),
    /// No answer within the request timeout.
    TimedOut,
    /// The route was never sent (see [`crate::validate_route`]).
    Invalid(String),
    /// The routing service says the route can no longer be refreshed.
    Invalidated,
}

/// One route of an attempt. `route` is the refreshed route for
/// [`RouteRefreshStatus::Refreshed`] and the unchanged input otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRefreshOutcome {
    pub route: Route,
    pub progress: RouteProgressData,
    pub status: RouteRefreshStatus,
}

impl RouteRefreshOutcome {
    pub fn new(route: Route, progress: RouteProgressData, status: RouteRefreshStatus) -> Self {
        Self {
            route,
            progress,
            status,
        }
    }

    pub fn is_refreshed(&self) -> bool {
        self.status == RouteRefreshStatus::Refreshed
    }

    pub fn is_request_failure(&self) -> bool {
        matches!(
            self.status,
            RouteRefreshStatus::Failed(_) | RouteRefreshStatus::TimedOut
        )
    }
}

/// Outcomes in the order the routes were given; the first is the primary route.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshAttemptResult {
    outcomes: Vec<RouteRefreshOutcome>,
}

impl RefreshAttemptResult {
    pub fn new(outcomes: Vec<RouteRefreshOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[RouteRefreshOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<RouteRefreshOutcome> {
        self.outcomes
    }

    pub fn primary(&self) -> Option<&RouteRefreshOutcome> {
        self.outcomes.first()
    }

    pub fn alternatives(&self) -> &[RouteRefreshOutcome] {
        self.outcomes.get(1..).unwrap_or_default()
    }

    /// Routes to continue with: refreshed where possible, unchanged elsewhere.
    pub fn routes(&self) -> Vec<Route> {
        self.outcomes.iter().map(|o| o.route.clone()).collect()
    }

    pub fn route_ids(&self) -> Vec<RouteId> {
        self.outcomes.iter().map(|o| o.route.id().clone()).collect()
    }

    /// At least one route was refreshed.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().any(RouteRefreshOutcome::is_refreshed)
    }

    /// At least one request failed or timed out, so another attempt might help.
    pub fn any_request_failed(&self) -> bool {
        self.outcomes.iter().any(RouteRefreshOutcome::is_request_failure)
    }

    /// Routes the routing service declared unrefreshable.
    pub fn invalidated_route_ids(&self) -> Vec<RouteId> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RouteRefreshStatus::Invalidated)
            .map(|o| o.route.id().clone())
            .collect()
    }
}
