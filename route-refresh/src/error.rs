//! Errors returned by the refresh pipeline.

use thiserror::Error;

/// Why a refresh attempt produced no result at all.
///
/// Per-route failures are not errors: they are reported as outcomes of the attempt
/// (see [`crate::RouteRefreshStatus`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no routes to refresh")]
    EmptyRoutes,
    /// A newer request replaced this one while it was still queued.
    #[error("Skipping request as a newer one is queued.")]
    Superseded,
    #[error("route progress unavailable: {0}")]
    ProgressUnavailable(String),
    #[error("route refresh executor shut down")]
    ExecutorShutdown,
}
