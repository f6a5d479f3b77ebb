//! Routing service seam: the one network call refresh depends on.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::progress::RouteProgressData;
use crate::route::{Route, RouteId};

/// Parameters of one route refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRefreshRequest {
    pub route_id: RouteId,
    pub request_uuid: String,
    pub route_index: usize,
    pub leg_index: usize,
    pub leg_geometry_index: usize,
    pub route_geometry_index: usize,
    /// Empty for non-electric routes.
    pub ev_data: HashMap<String, String>,
}

impl RouteRefreshRequest {
    pub fn new(route: &Route, progress: RouteProgressData, ev_data: HashMap<String, String>) -> Self {
        Self {
            route_id: route.id().clone(),
            request_uuid: route.request_uuid().unwrap_or_default().to_string(),
            route_index: route.route_index(),
            leg_index: progress.leg_index,
            leg_geometry_index: progress.leg_geometry_index,
            route_geometry_index: progress.route_geometry_index,
            ev_data,
        }
    }
}

/// Failure reported by the routing service for one route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RouterRefreshError {
    pub message: String,
    /// Seconds the route stays refreshable; `Some(0)` means it no longer is.
    pub refresh_ttl: Option<u64>,
}

impl RouterRefreshError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            refresh_ttl: None,
        }
    }

    pub fn with_refresh_ttl(mut self, ttl: u64) -> Self {
        self.refresh_ttl = Some(ttl);
        self
    }

    pub fn invalidates_route(&self) -> bool {
        self.refresh_ttl == Some(0)
    }
}

/// Client for the routing service refresh endpoint.
///
/// Implementations return the whole refreshed route (for example by applying the
/// response legs with [`Route::refreshed_from_legs`]); its id must equal the id of
/// `route`.
#[async_trait]
pub trait RouteRefreshClient: Send + Sync {
    async fn refresh_route(
        &self,
        route: &Route,
        request: &RouteRefreshRequest,
    ) -> Result<Route, RouterRefreshError>;

    /// Aborts the in-flight request for `route_id`, if the transport supports it.
    fn cancel_route_refresh(&self, _route_id: &RouteId) {}
}
