//! Periodic latency monitor.
//!
//! A watchdog task sleeps for a fixed interval, reads the latency window and
//! hands an [`Alert`] to the notifier whenever the mean is above threshold.
//! It is stopped cooperatively: the stop request is observed at the next wake,
//! never in the middle of a sleep.

use crate::{latency::LatencySampler, notifier::AlertNotifier};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

/// Raised when the window mean exceeds the configured threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub mean: Duration,
    pub stddev: Duration,
    pub threshold: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of a watchdog task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// The monitoring loop and everything it reads.
pub struct Watchdog {
    sampler: Arc<LatencySampler>,
    notifier: Arc<dyn AlertNotifier>,
    interval: Duration,
    threshold: Duration,
}

impl Watchdog {
    pub fn new(
        sampler: Arc<LatencySampler>,
        notifier: Arc<dyn AlertNotifier>,
        interval: Duration,
        threshold: Duration,
    ) -> Self {
        Self {
            sampler,
            notifier,
            interval,
            threshold,
        }
    }

    /// Runs one monitoring cycle and returns the alert it emitted, if any.
    ///
    /// An empty window is skipped silently.
    pub async fn check(&self) -> Option<Alert> {
        let stats = self.sampler.stats()?;
        info!(
            samples = stats.count,
            mean_ms = stats.mean.as_millis() as u64,
            "Average round-trip latency"
        );
        if stats.mean <= self.threshold {
            return None;
        }

        let alert = Alert {
            mean: stats.mean,
            stddev: stats.stddev,
            threshold: self.threshold,
            timestamp: Utc::now(),
        };
        self.notifier.notify(alert.clone()).await;
        Some(alert)
    }

    /// Starts the loop on the tokio runtime.
    pub fn spawn(self) -> WatchdogHandle {
        self.spawn_with_state(Arc::new(Mutex::new(WatchdogState::Idle)))
    }

    /// Starts the loop, reporting its lifecycle through `state`.
    ///
    /// The task is the only writer of `Stopped`, so readers of `state` never
    /// see it before the loop has actually exited.
    pub fn spawn_with_state(self, state: Arc<Mutex<WatchdogState>>) -> WatchdogHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        *state.lock() = WatchdogState::Running;

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            info!(interval_ms = self.interval.as_millis() as u64, "Watchdog started.");
            loop {
                tokio::time::sleep(self.interval).await;
                let stop_requested = *stop_rx.borrow();
                // A dropped handle counts as a stop request.
                if stop_requested || stop_rx.has_changed().is_err() {
                    break;
                }
                self.check().await;
            }
            *task_state.lock() = WatchdogState::Stopped;
            info!("Watchdog stopped.");
        });

        WatchdogHandle {
            stop_tx,
            state,
            task,
        }
    }
}

/// Owner's side of a running watchdog.
#[derive(Debug)]
pub struct WatchdogHandle {
    stop_tx: watch::Sender<bool>,
    state: Arc<Mutex<WatchdogState>>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    pub fn state(&self) -> WatchdogState {
        *self.state.lock()
    }

    /// Requests a stop and waits until the loop has exited.
    pub async fn stop(self) -> WatchdogState {
        {
            let mut state = self.state.lock();
            if *state == WatchdogState::Running {
                *state = WatchdogState::Stopping;
            }
        }
        // The receiver lives as long as the task; a send error means it already ended.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            // A panicked or aborted task never reached its own exit path.
            debug!(error = %e, "Watchdog task ended abnormally");
            *self.state.lock() = WatchdogState::Stopped;
        }
        *self.state.lock()
    }
}
