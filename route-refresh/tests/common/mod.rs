//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use route_refresh::{
    ProgressTracker, RefreshAttemptResult, Route, RouteProgressData, RouteRefreshClient,
    RouteRefreshController, RouteRefreshObserver, RouteRefreshOptions, RouteRefreshRequest,
    RouteRefreshStateResult, RouteRefreshStatesObserver, RouterRefreshError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Refresh,
    Fail,
    /// Error with a zero refresh TTL: the route can no longer be refreshed.
    Invalidate,
}

/// Routing service fake. Replies are consumed in call order; once they run out every
/// call refreshes. With a gate, each call waits for a permit.
pub struct FakeRouter {
    replies: Mutex<VecDeque<Reply>>,
    gate: Option<Semaphore>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRouter {
    pub fn new(replies: &[Reply]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            gate: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            gate: Some(Semaphore::new(0)),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn open_gate(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteRefreshClient for FakeRouter {
    async fn refresh_route(
        &self,
        route: &Route,
        _request: &RouteRefreshRequest,
    ) -> Result<Route, RouterRefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Refresh);
        match reply {
            Reply::Fail => Err(RouterRefreshError::new("Route refresh failed")),
            Reply::Invalidate => {
                Err(RouterRefreshError::new("Route is expired").with_refresh_ttl(0))
            }
            Reply::Refresh => {
                let legs = route
                    .legs()
                    .iter()
                    .map(|leg| {
                        let mut leg = leg.clone();
                        if let Some(annotation) = leg.annotation.as_mut() {
                            if let Some(congestion) = annotation.congestion.as_mut() {
                                congestion.fill("moderate".to_string());
                            }
                        }
                        leg
                    })
                    .collect();
                Ok(route.with_legs(legs))
            }
        }
    }
}

/// Records state changes and delivered results.
#[derive(Default)]
pub struct Recorder {
    states: Mutex<Vec<RouteRefreshStateResult>>,
    results: Mutex<Vec<RefreshAttemptResult>>,
}

impl Recorder {
    pub fn states(&self) -> Vec<&'static str> {
        self.states.lock().unwrap().iter().map(|s| s.state).collect()
    }

    pub fn state_results(&self) -> Vec<RouteRefreshStateResult> {
        self.states.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<RefreshAttemptResult> {
        self.results.lock().unwrap().clone()
    }
}

impl RouteRefreshStatesObserver for Recorder {
    fn on_new_state(&self, result: &RouteRefreshStateResult) {
        self.states.lock().unwrap().push(result.clone());
    }
}

impl RouteRefreshObserver for Recorder {
    fn on_routes_refreshed(&self, result: &RefreshAttemptResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

/// A refreshable route with congestion and one incident ending 2022-07-01.
pub fn test_route(uuid: &str) -> Route {
    Route::from_json(&format!(
        r#"{{
            "request_uuid": "{uuid}",
            "route_index": 0,
            "options": {{"enable_refresh": true}},
            "legs": [{{
                "annotation": {{
                    "congestion": ["low", "heavy", "low"],
                    "congestion_numeric": [10, 80, 12],
                    "speed": [11.1, 4.2, 12.5]
                }},
                "incidents": [{{"id": "1", "type": "construction", "end_time": "2022-07-01T00:00:00Z"}}]
            }}]
        }}"#
    ))
    .expect("fixture route")
}

pub struct Harness {
    pub controller: RouteRefreshController,
    pub progress: Arc<ProgressTracker>,
    pub recorder: Arc<Recorder>,
}

/// Controller with both observers registered and the wall clock fixed after the
/// fixture incident ends.
pub fn harness(options: RouteRefreshOptions, router: Arc<FakeRouter>, primary: &Route) -> Harness {
    let progress = Arc::new(ProgressTracker::new());
    progress.on_route_progress(primary.id().clone(), RouteProgressData::default());
    let controller = RouteRefreshController::builder(options, router, progress.clone())
        .date_provider(Arc::new(|| Utc.with_ymd_and_hms(2022, 7, 2, 0, 0, 0).unwrap()))
        .build()
        .expect("valid options");
    let recorder = Arc::new(Recorder::default());
    controller.register_route_refresh_state_observer(recorder.clone());
    controller.register_route_refresh_observer(recorder.clone());
    Harness {
        controller,
        progress,
        recorder,
    }
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Lets every ready task run without moving the clock past pending timers.
pub async fn settle() {
    advance(Duration::from_millis(1)).await;
}
