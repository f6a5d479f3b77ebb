//! Which routes the routing service will still refresh.
//!
//! A route carries a refresh TTL from the moment it is received; refresh responses
//! (successful or not) may extend or end it. An expired route is never requested again.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::route::{Route, RouteId};

/// Refresh deadlines keyed by route id. Routes without a known TTL never expire.
#[derive(Debug, Default)]
pub struct RouteExpirationTracker {
    expires_at: Mutex<HashMap<RouteId, Instant>>,
}

impl RouteExpirationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock for a route seen for the first time. Known routes are untouched.
    pub fn track(&self, route: &Route) {
        let Some(ttl) = route.refresh_ttl() else {
            return;
        };
        self.lock()
            .entry(route.id().clone())
            .or_insert_with(|| Instant::now() + Duration::from_secs(ttl));
    }

    /// The route stays refreshable for `ttl_secs` from now. `0` expires it.
    pub fn update(&self, route_id: &RouteId, ttl_secs: u64) {
        self.lock()
            .insert(route_id.clone(), Instant::now() + Duration::from_secs(ttl_secs));
    }

    pub fn invalidate(&self, route_id: &RouteId) {
        self.update(route_id, 0);
    }

    pub fn is_expired(&self, route_id: &RouteId) -> bool {
        self.lock()
            .get(route_id)
            .is_some_and(|expires_at| *expires_at <= Instant::now())
    }

    /// Forgets every route not in `routes`.
    pub fn retain(&self, routes: &[Route]) {
        self.lock()
            .retain(|id, _| routes.iter().any(|route| route.id() == id));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RouteId, Instant>> {
        self.expires_at.lock().unwrap_or_else(|e| e.into_inner())
    }
}
