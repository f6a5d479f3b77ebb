//! Where the user is on each route, expressed as leg and geometry indices.
//!
//! A refresh request only covers the part of a route still ahead of the user, so every
//! attempt first asks a [`RouteProgressProvider`] for the current indices of each route.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::RefreshError;
use crate::route::{Route, RouteId};

/// Position of the user along one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteProgressData {
    pub leg_index: usize,
    pub leg_geometry_index: usize,
    pub route_geometry_index: usize,
}

impl RouteProgressData {
    pub fn new(leg_index: usize, leg_geometry_index: usize, route_geometry_index: usize) -> Self {
        Self {
            leg_index,
            leg_geometry_index,
            route_geometry_index,
        }
    }
}

/// Supplies progress for a set of routes.
#[async_trait]
pub trait RouteProgressProvider: Send + Sync {
    /// One entry per route, in the order of `routes`.
    async fn routes_progress(&self, routes: &[Route]) -> Result<Vec<RouteProgressData>, RefreshError>;
}

#[derive(Debug, Clone)]
struct PrimaryProgress {
    route_id: RouteId,
    progress: RouteProgressData,
}

/// Progress fed by the navigation session.
///
/// The primary route's indices come from location updates; alternatives are
/// known through a route-id → indices mapping. [`RouteProgressProvider::routes_progress`]
/// waits until the first primary update arrives.
pub struct ProgressTracker {
    primary: watch::Sender<Option<PrimaryProgress>>,
    alternatives: Mutex<HashMap<RouteId, RouteProgressData>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (primary, _) = watch::channel(None);
        Self {
            primary,
            alternatives: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_route_progress(&self, route_id: RouteId, progress: RouteProgressData) {
        self.primary
            .send_replace(Some(PrimaryProgress { route_id, progress }));
    }

    pub fn on_alternative_progress(&self, route_id: RouteId, progress: RouteProgressData) {
        self.alternatives
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(route_id, progress);
    }

    /// Replaces the whole alternative mapping, e.g. after alternatives were recomputed.
    pub fn set_alternatives(&self, alternatives: HashMap<RouteId, RouteProgressData>) {
        *self.alternatives.lock().unwrap_or_else(|e| e.into_inner()) = alternatives;
    }

    /// Forgets all progress. The next lookup waits for a fresh primary update.
    pub fn reset(&self) {
        self.primary.send_replace(None);
        self.alternatives
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[async_trait]
impl RouteProgressProvider for ProgressTracker {
    async fn routes_progress(&self, routes: &[Route]) -> Result<Vec<RouteProgressData>, RefreshError> {
        if routes.is_empty() {
            return Err(RefreshError::EmptyRoutes);
        }
        let mut rx = self.primary.subscribe();
        let primary = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|e| RefreshError::ProgressUnavailable(e.to_string()))?
            .clone();
        let Some(primary) = primary else {
            return Err(RefreshError::ProgressUnavailable("no primary progress".into()));
        };

        let alternatives = self.alternatives.lock().unwrap_or_else(|e| e.into_inner());
        Ok(routes
            .iter()
            .map(|route| {
                if route.id() == &primary.route_id {
                    primary.progress
                } else if let Some(progress) = alternatives.get(route.id()) {
                    *progress
                } else {
                    tracing::debug!(route_id = %route.id(), "no progress known for alternative, refreshing from start");
                    RouteProgressData::default()
                }
            })
            .collect())
    }
}
