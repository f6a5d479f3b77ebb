//! Cancelable delayed tasks on a single timeline.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Waits out refresh intervals and remembers the running deadline so a paused
/// cycle can resume the remaining time instead of starting over.
#[derive(Debug)]
pub struct Delayer {
    interval: Duration,
    deadline: Mutex<Option<Instant>>,
}

impl Delayer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts a fresh interval and returns its deadline.
    pub fn arm(&self) -> Instant {
        let deadline = Instant::now() + self.interval;
        *self.lock() = Some(deadline);
        deadline
    }

    /// The remembered deadline, or a freshly armed one.
    pub fn resume_deadline(&self) -> Instant {
        let remembered = *self.lock();
        remembered.unwrap_or_else(|| self.arm())
    }

    /// Starts a fresh interval and waits for it.
    pub async fn delay(&self) {
        sleep_until(self.arm()).await;
    }

    /// Waits for the remembered deadline; returns at once if it passed. Without a
    /// deadline this is [`delay`](Self::delay).
    pub async fn resume_delay(&self) {
        sleep_until(self.resume_deadline()).await;
    }

    /// Forgets the running deadline.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.deadline.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// How a scheduled task waits before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// A fresh interval.
    Interval,
    /// The remainder of the running interval.
    Resume,
    /// No wait.
    Immediate,
}

/// Spawns delayed tasks that can all be canceled at once.
///
/// Every task gets a child of one root token; [`cancel_all`](Self::cancel_all) cancels
/// the root and starts a new one, so tasks scheduled afterwards are unaffected.
pub struct DelayScheduler {
    root: Mutex<CancellationToken>,
    delayer: Arc<Delayer>,
}

impl DelayScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            root: Mutex::new(CancellationToken::new()),
            delayer: Arc::new(Delayer::new(interval)),
        }
    }

    pub fn delayer(&self) -> &Arc<Delayer> {
        &self.delayer
    }

    /// Runs `task` after `delay` unless canceled first. The deadline is fixed now, not
    /// when the task is first polled. Cancel the returned token to stop this task
    /// alone; the task is dropped at its next await point.
    pub fn schedule<F>(&self, delay: Delay, task: F) -> CancellationToken
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.root.lock().unwrap_or_else(|e| e.into_inner()).child_token();
        let guard = token.clone();
        let deadline = match delay {
            Delay::Interval => Some(self.delayer.arm()),
            Delay::Resume => Some(self.delayer.resume_deadline()),
            Delay::Immediate => None,
        };
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => {}
                _ = async {
                    if let Some(deadline) = deadline {
                        sleep_until(deadline).await;
                    }
                    task.await;
                } => {}
            }
        });
        token
    }

    pub fn cancel_all(&self) {
        let mut root = self.root.lock().unwrap_or_else(|e| e.into_inner());
        root.cancel();
        *root = CancellationToken::new();
    }
}

impl Drop for DelayScheduler {
    fn drop(&mut self) {
        self.root.lock().unwrap_or_else(|e| e.into_inner()).cancel();
    }
}
