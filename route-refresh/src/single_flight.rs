//! At most one refresh attempt in flight, at most one waiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::RefreshError;
use crate::refresher::{RefreshAttemptResult, RouteRefresher};
use crate::route::Route;
use crate::LOG_CATEGORY;

type StartCallback = Box<dyn FnOnce() + Send>;
type Reply = oneshot::Sender<Result<RefreshAttemptResult, RefreshError>>;

struct QueuedRequest {
    routes: Vec<Route>,
    timeout: Duration,
    start_callback: StartCallback,
    reply: Reply,
}

#[derive(Default)]
struct Queue {
    running: bool,
    queued: Option<QueuedRequest>,
}

struct Inner {
    refresher: RouteRefresher,
    queue: Mutex<Queue>,
}

/// Serializes refresh attempts.
///
/// A request issued while another attempt runs waits in a one-slot queue; a newer
/// request replaces it and the replaced caller gets [`RefreshError::Superseded`]. A
/// caller that drops its future while queued never starts. An attempt that started
/// runs to completion on its own task even if its caller goes away.
#[derive(Clone)]
pub struct RouteRefresherExecutor {
    inner: Arc<Inner>,
}

impl RouteRefresherExecutor {
    pub fn new(refresher: RouteRefresher) -> Self {
        Self {
            inner: Arc::new(Inner {
                refresher,
                queue: Mutex::new(Queue::default()),
            }),
        }
    }

    /// Queues a refresh of `routes`. `start_callback` runs right before the attempt
    /// actually starts; it never runs for a superseded or abandoned request.
    pub async fn execute_routes_refresh(
        &self,
        routes: Vec<Route>,
        timeout: Duration,
        start_callback: impl FnOnce() + Send + 'static,
    ) -> Result<RefreshAttemptResult, RefreshError> {
        let (reply, rx) = oneshot::channel();
        let replaced = {
            let mut queue = self.inner.lock();
            queue.queued.replace(QueuedRequest {
                routes,
                timeout,
                start_callback: Box::new(start_callback),
                reply,
            })
        };
        if let Some(replaced) = replaced {
            tracing::debug!(category = LOG_CATEGORY, "route refresh request superseded");
            let _ = replaced.reply.send(Err(RefreshError::Superseded));
        }
        Inner::run_queue(&self.inner);
        rx.await.map_err(|_| RefreshError::ExecutorShutdown)?
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_queue(inner: &Arc<Inner>) {
        let request = {
            let mut queue = inner.lock();
            if queue.running {
                return;
            }
            let Some(request) = queue.queued.take() else {
                return;
            };
            if request.reply.is_closed() {
                tracing::debug!(category = LOG_CATEGORY, "dropping abandoned route refresh request");
                return;
            }
            queue.running = true;
            request
        };

        let running = RunningGuard(inner.clone());
        tokio::spawn(async move {
            (request.start_callback)();
            let result = running
                .0
                .refresher
                .refresh(&request.routes, request.timeout)
                .await;
            let _ = request.reply.send(result);
            drop(running);
        });
    }
}

/// Frees the executor when an attempt ends, also when the client panics mid-attempt.
struct RunningGuard(Arc<Inner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.lock().running = false;
        // No runtime left to start queued requests on while it shuts down.
        if tokio::runtime::Handle::try_current().is_ok() {
            Inner::run_queue(&self.0);
        }
    }
}
