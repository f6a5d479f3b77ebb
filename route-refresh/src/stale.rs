//! Strips time-sensitive data that may no longer be true.
//!
//! When refreshes keep failing, congestion and incidents ahead of the user age. After
//! the stale-data timeout they are replaced by "unknown" values rather than shown as
//! current.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::refresher::{RefreshAttemptResult, RouteRefreshOutcome};
use crate::route::{Route, RouteLeg, UNKNOWN_CONGESTION};

/// Wall-clock source used to decide whether an incident is over.
pub type DateProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_date_provider() -> DateProvider {
    Arc::new(Utc::now)
}

pub struct ExpiringDataRemover {
    now: DateProvider,
}

impl ExpiringDataRemover {
    pub fn new(now: DateProvider) -> Self {
        Self { now }
    }

    /// Each route is stripped from its own current leg on. An unchanged result is
    /// returned equal to the input.
    pub fn remove_expiring_data_from_routes(&self, result: &RefreshAttemptResult) -> RefreshAttemptResult {
        let now = (self.now)();
        RefreshAttemptResult::new(
            result
                .outcomes()
                .iter()
                .map(|outcome| RouteRefreshOutcome {
                    route: strip_route(&outcome.route, outcome.progress.leg_index, now),
                    ..outcome.clone()
                })
                .collect(),
        )
    }

    /// Single-route form of [`remove_expiring_data_from_routes`](Self::remove_expiring_data_from_routes).
    pub fn remove_expiring_data_from_route(&self, route: &Route, current_leg_index: usize) -> Route {
        strip_route(route, current_leg_index, (self.now)())
    }
}

fn strip_route(route: &Route, current_leg_index: usize, now: DateTime<Utc>) -> Route {
    let legs = route
        .legs()
        .iter()
        .enumerate()
        .map(|(index, leg)| {
            if index < current_leg_index {
                leg.clone()
            } else {
                strip_leg(leg, now)
            }
        })
        .collect();
    route.with_legs(legs)
}

fn strip_leg(leg: &RouteLeg, now: DateTime<Utc>) -> RouteLeg {
    let annotation = leg.annotation.as_ref().map(|annotation| {
        let mut annotation = annotation.clone();
        if let Some(congestion) = annotation.congestion.as_mut() {
            congestion.fill(UNKNOWN_CONGESTION.to_string());
        }
        if let Some(numeric) = annotation.congestion_numeric.as_mut() {
            numeric.fill(None);
        }
        annotation
    });
    // Incidents without a readable end time cannot be proven current.
    let incidents = leg.incidents.as_ref().map(|incidents| {
        incidents
            .iter()
            .filter(|incident| incident.end_time_utc().is_some_and(|end| end >= now))
            .cloned()
            .collect()
    });
    RouteLeg {
        annotation,
        incidents,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::progress::RouteProgressData;
    use crate::refresher::RouteRefreshStatus;
    use crate::route::{Incident, LegAnnotation, RouteOptions};

    fn fixed_now() -> DateProvider {
        Arc::new(|| Utc.with_ymd_and_hms(2022, 6, 30, 20, 0, 0).unwrap())
    }

    fn incident(id: &str, end_time: &str) -> Incident {
        Incident {
            id: id.into(),
            end_time: Some(end_time.into()),
            ..Default::default()
        }
    }

    fn leg(congestion: &[&str], numeric: &[Option<u8>], incidents: Vec<Incident>) -> RouteLeg {
        RouteLeg {
            annotation: Some(LegAnnotation {
                congestion: Some(congestion.iter().map(|c| c.to_string()).collect()),
                congestion_numeric: Some(numeric.to_vec()),
                speed: Some(vec![1.0; congestion.len()]),
                ..Default::default()
            }),
            incidents: Some(incidents),
        }
    }

    fn route(legs: Vec<RouteLeg>) -> Route {
        Route::new(
            Some("req".into()),
            0,
            RouteOptions {
                enable_refresh: true,
                electric: false,
            },
            legs,
        )
    }

    #[test]
    fn strips_current_and_later_legs_only() {
        let remover = ExpiringDataRemover::new(fixed_now());
        let original = route(vec![
            leg(&["low"], &[Some(10)], vec![incident("passed", "2022-06-29T00:00:00Z")]),
            leg(
                &["heavy", "low"],
                &[Some(80), Some(5)],
                vec![
                    incident("over", "2022-06-30T19:59:59Z"),
                    incident("ongoing", "2022-06-30T21:00:00Z"),
                    incident("garbled", "2022-06-31T21:59:00Z"),
                ],
            ),
        ]);

        let stripped = remover.remove_expiring_data_from_route(&original, 1);

        assert_eq!(stripped.legs()[0], original.legs()[0]);
        let annotation = stripped.legs()[1].annotation.as_ref().unwrap();
        assert_eq!(
            annotation.congestion,
            Some(vec!["unknown".to_string(), "unknown".to_string()])
        );
        assert_eq!(annotation.congestion_numeric, Some(vec![None, None]));
        assert_eq!(annotation.speed, Some(vec![1.0, 1.0]));
        let ids: Vec<_> = stripped.legs()[1]
            .incidents
            .as_ref()
            .unwrap()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ongoing"]);
        assert_eq!(stripped.id(), original.id());
    }

    #[test]
    fn legs_without_annotation_or_incidents_pass_through() {
        let remover = ExpiringDataRemover::new(fixed_now());
        let original = route(vec![RouteLeg::default()]);
        assert_eq!(remover.remove_expiring_data_from_route(&original, 0), original);
    }

    #[test]
    fn nothing_stale_returns_equal_result() {
        let remover = ExpiringDataRemover::new(fixed_now());
        let fresh = route(vec![leg(
            &["unknown"],
            &[None],
            vec![incident("ongoing", "2022-07-01T00:00:00Z")],
        )]);
        let result = RefreshAttemptResult::new(vec![RouteRefreshOutcome::new(
            fresh,
            RouteProgressData::default(),
            RouteRefreshStatus::Failed("boom".into()),
        )]);

        assert_eq!(remover.remove_expiring_data_from_routes(&result), result);
    }

    #[test]
    fn uses_each_routes_own_leg_index() {
        let remover = ExpiringDataRemover::new(fixed_now());
        let two_legs = || route(vec![leg(&["low"], &[Some(1)], vec![]), leg(&["low"], &[Some(1)], vec![])]);
        let result = RefreshAttemptResult::new(vec![
            RouteRefreshOutcome::new(two_legs(), RouteProgressData::new(1, 0, 0), RouteRefreshStatus::TimedOut),
            RouteRefreshOutcome::new(two_legs(), RouteProgressData::new(0, 0, 0), RouteRefreshStatus::TimedOut),
        ]);

        let stripped = remover.remove_expiring_data_from_routes(&result);

        let first = &stripped.outcomes()[0].route;
        let second = &stripped.outcomes()[1].route;
        assert_eq!(
            first.legs()[0].annotation.as_ref().unwrap().congestion,
            Some(vec!["low".to_string()])
        );
        assert_eq!(
            second.legs()[0].annotation.as_ref().unwrap().congestion,
            Some(vec!["unknown".to_string()])
        );
        assert_eq!(stripped.outcomes()[0].status, RouteRefreshStatus::TimedOut);
    }
}
