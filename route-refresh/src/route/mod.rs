//! Route model: the parts of a routing-service response that refresh touches.
//!
//! A [`Route`] is immutable. Refreshing produces a new value with the same [`RouteId`];
//! nothing in this crate mutates a route in place.

mod merge;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use merge::{merge_annotation_values, merge_leg_annotation};

/// Congestion category written over stale congestion values.
pub const UNKNOWN_CONGESTION: &str = "unknown";

/// Stable route identifier, `"<request uuid>#<route index>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request options the route was computed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Whether the routing service was asked for a refreshable route.
    pub enable_refresh: bool,
    /// Electric-vehicle routing; refresh requests then carry EV data.
    pub electric: bool,
}

/// Posted speed limit for one geometry segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxSpeed {
    pub speed: Option<u32>,
    pub unit: Option<String>,
    pub unknown: bool,
    pub none: bool,
}

/// Per-segment measurements of one leg. Arrays are indexed by leg geometry segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegAnnotation {
    pub distance: Option<Vec<f64>>,
    pub duration: Option<Vec<f64>>,
    pub speed: Option<Vec<f64>>,
    #[serde(rename = "maxspeed")]
    pub max_speed: Option<Vec<MaxSpeed>>,
    pub congestion: Option<Vec<String>>,
    pub congestion_numeric: Option<Vec<Option<u8>>>,
}

/// A traffic incident attached to a leg.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    /// ISO-8601 timestamp.
    pub start_time: Option<String>,
    /// ISO-8601 timestamp.
    pub end_time: Option<String>,
    pub geometry_index_start: Option<usize>,
    pub geometry_index_end: Option<usize>,
}

impl Incident {
    /// End of validity, `None` when missing or not a valid ISO-8601 timestamp.
    pub fn end_time_utc(&self) -> Option<DateTime<Utc>> {
        parse_iso8601(self.end_time.as_deref()?)
    }
}

pub(crate) fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// One origin-to-waypoint segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteLeg {
    pub annotation: Option<LegAnnotation>,
    pub incidents: Option<Vec<Incident>>,
}

#[derive(Serialize, Deserialize)]
struct RouteRepr {
    #[serde(default)]
    request_uuid: Option<String>,
    #[serde(default)]
    route_index: usize,
    #[serde(default)]
    options: RouteOptions,
    #[serde(default)]
    legs: Vec<RouteLeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_ttl: Option<u64>,
}

/// A route from the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RouteRepr", into = "RouteRepr")]
pub struct Route {
    id: RouteId,
    request_uuid: Option<String>,
    route_index: usize,
    options: RouteOptions,
    legs: Vec<RouteLeg>,
    refresh_ttl: Option<u64>,
}

impl From<RouteRepr> for Route {
    fn from(repr: RouteRepr) -> Self {
        Route {
            refresh_ttl: repr.refresh_ttl,
            ..Route::new(repr.request_uuid, repr.route_index, repr.options, repr.legs)
        }
    }
}

impl From<Route> for RouteRepr {
    fn from(route: Route) -> Self {
        RouteRepr {
            request_uuid: route.request_uuid,
            route_index: route.route_index,
            options: route.options,
            legs: route.legs,
            refresh_ttl: route.refresh_ttl,
        }
    }
}

impl Route {
    /// Routes without a request uuid (e.g. computed on-device) get a `local` id prefix
    /// and can never be refreshed.
    pub fn new(
        request_uuid: Option<String>,
        route_index: usize,
        options: RouteOptions,
        legs: Vec<RouteLeg>,
    ) -> Self {
        let prefix = request_uuid
            .as_deref()
            .filter(|uuid| !uuid.trim().is_empty())
            .unwrap_or("local");
        Self {
            id: RouteId::new(format!("{prefix}#{route_index}")),
            request_uuid,
            route_index,
            options,
            legs,
            refresh_ttl: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Route, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn request_uuid(&self) -> Option<&str> {
        self.request_uuid.as_deref()
    }

    pub fn route_index(&self) -> usize {
        self.route_index
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    /// Seconds the routing service keeps this route refreshable after sending it.
    pub fn refresh_ttl(&self) -> Option<u64> {
        self.refresh_ttl
    }

    pub fn with_refresh_ttl(self, ttl: u64) -> Route {
        Route {
            refresh_ttl: Some(ttl),
            ..self
        }
    }

    /// Same route with replaced legs. The id is kept.
    pub fn with_legs(&self, legs: Vec<RouteLeg>) -> Route {
        Route {
            legs,
            ..self.clone()
        }
    }

    /// Applies a refresh response.
    ///
    /// `refreshed_legs[0]` corresponds to leg `leg_index` of this route and only covers the
    /// geometry from `leg_geometry_index` on; later response legs cover their whole leg.
    /// Legs already passed, and legs the response does not cover, are kept as they are.
    pub fn refreshed_from_legs(
        &self,
        refreshed_legs: &[RouteLeg],
        leg_index: usize,
        leg_geometry_index: usize,
    ) -> Route {
        let legs = self
            .legs
            .iter()
            .enumerate()
            .map(|(index, leg)| {
                let Some(new_leg) = index
                    .checked_sub(leg_index)
                    .and_then(|offset| refreshed_legs.get(offset))
                else {
                    return leg.clone();
                };
                let start = if index == leg_index { leg_geometry_index } else { 0 };
                RouteLeg {
                    annotation: merge_leg_annotation(
                        leg.annotation.as_ref(),
                        new_leg.annotation.as_ref(),
                        start,
                    ),
                    incidents: new_leg.incidents.clone(),
                }
            })
            .collect();
        self.with_legs(legs)
    }
}
