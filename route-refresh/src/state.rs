//! Lifecycle of route refreshes as reported to state observers.
//!
//! ```text
//! Idle -> Started -> Succeeded | Failed -> ...
//!            \-> Canceled        \-> ClearedExpired
//! ```
//!
//! Repeating the current state is silent, and a cancel is only reported while a
//! refresh could actually be in progress (not from `Idle` or `Succeeded`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::observers::ObserverRegistry;
use crate::LOG_CATEGORY;

/// A refresh started.
pub const STARTED: &str = "STARTED";
/// At least one route was refreshed.
pub const FINISHED_SUCCESS: &str = "FINISHED_SUCCESS";
/// The attempt (and its retries) refreshed nothing.
pub const FINISHED_FAILED: &str = "FINISHED_FAILED";
/// A started refresh was canceled.
pub const CANCELED: &str = "CANCELED";
/// Stale congestion and incidents were removed from the routes.
pub const CLEARED_EXPIRED: &str = "CLEARED_EXPIRED";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteRefreshState {
    #[default]
    Idle,
    Started,
    Succeeded,
    Failed(Option<String>),
    Canceled,
    ClearedExpired,
}

impl RouteRefreshState {
    /// Lifecycle constant, `None` for `Idle` which is never reported.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            RouteRefreshState::Idle => None,
            RouteRefreshState::Started => Some(STARTED),
            RouteRefreshState::Succeeded => Some(FINISHED_SUCCESS),
            RouteRefreshState::Failed(_) => Some(FINISHED_FAILED),
            RouteRefreshState::Canceled => Some(CANCELED),
            RouteRefreshState::ClearedExpired => Some(CLEARED_EXPIRED),
        }
    }

    fn to_result(&self) -> Option<RouteRefreshStateResult> {
        let state = self.name()?;
        let message = match self {
            RouteRefreshState::Failed(message) => message.clone(),
            _ => None,
        };
        Some(RouteRefreshStateResult { state, message })
    }
}

/// What observers receive: one of the lifecycle constants and an optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRefreshStateResult {
    pub state: &'static str,
    pub message: Option<String>,
}

pub trait RouteRefreshStatesObserver: Send + Sync {
    fn on_new_state(&self, result: &RouteRefreshStateResult);
}

type Delivery = (RouteRefreshStateResult, Vec<Arc<dyn RouteRefreshStatesObserver>>);

#[derive(Default)]
struct Shared {
    state: RouteRefreshState,
    /// Results waiting for delivery, each with the observers registered when it was produced.
    pending: VecDeque<Delivery>,
    delivering: bool,
}

/// Tracks the refresh lifecycle and notifies state observers.
///
/// Deliveries are serialized: one caller at a time drains the pending queue, so an
/// observer never sees two states concurrently or out of order. A transition made while
/// another thread (or the observer itself) is delivering is queued and delivered by that
/// caller.
#[derive(Default)]
pub struct RouteRefreshStateHolder {
    shared: Mutex<Shared>,
    observers: ObserverRegistry<dyn RouteRefreshStatesObserver>,
}

/// Releases the delivering role even if an observer panics.
struct DeliveringGuard<'a>(&'a RouteRefreshStateHolder);

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().delivering = false;
    }
}

impl RouteRefreshStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_started(&self) {
        self.transition(RouteRefreshState::Started, |_| true);
    }

    pub fn on_success(&self) {
        self.transition(RouteRefreshState::Succeeded, |_| true);
    }

    pub fn on_failure(&self, message: Option<String>) {
        self.transition(RouteRefreshState::Failed(message), |_| true);
    }

    pub fn on_cancel(&self) {
        self.transition(RouteRefreshState::Canceled, |current| {
            !matches!(current, RouteRefreshState::Idle | RouteRefreshState::Succeeded)
        });
    }

    pub fn on_cleared_expired(&self) {
        self.transition(RouteRefreshState::ClearedExpired, |_| true);
    }

    /// Back to `Idle` without notifying anyone.
    pub fn reset(&self) {
        self.lock().state = RouteRefreshState::Idle;
    }

    pub fn current_state(&self) -> RouteRefreshState {
        self.lock().state.clone()
    }

    /// The observer immediately receives the current state unless it is `Idle`.
    pub fn register_observer(&self, observer: Arc<dyn RouteRefreshStatesObserver>) {
        {
            let mut shared = self.lock();
            self.observers.register(observer.clone());
            if let Some(result) = shared.state.to_result() {
                shared.pending.push_back((result, vec![observer]));
            }
        }
        self.deliver_pending();
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn RouteRefreshStatesObserver>) {
        self.observers.unregister(observer);
    }

    pub fn unregister_all_observers(&self) {
        self.observers.unregister_all();
    }

    fn transition(&self, new: RouteRefreshState, allowed_from: impl FnOnce(&RouteRefreshState) -> bool) {
        {
            let mut shared = self.lock();
            if shared.state == new || !allowed_from(&shared.state) {
                return;
            }
            tracing::debug!(category = LOG_CATEGORY, from = ?shared.state, to = ?new, "route refresh state changed");
            shared.state = new;
            if let Some(result) = shared.state.to_result() {
                shared.pending.push_back((result, self.observers.snapshot()));
            }
        }
        self.deliver_pending();
    }

    /// Drains the queue unless another caller already does.
    fn deliver_pending(&self) {
        {
            let mut shared = self.lock();
            if shared.delivering {
                return;
            }
            shared.delivering = true;
        }
        let guard = DeliveringGuard(self);
        loop {
            let next = self.lock().pending.pop_front();
            let Some((result, observers)) = next else {
                break;
            };
            for observer in observers {
                observer.on_new_state(&result);
            }
        }
        drop(guard);
        // Results queued after the last pop but before the release.
        if !self.lock().pending.is_empty() {
            self.deliver_pending();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}
