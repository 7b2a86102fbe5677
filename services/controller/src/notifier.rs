//! Downstream consumers of watchdog alerts.

use crate::watchdog::Alert;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives alerts raised by the watchdog.
///
/// Implementations run on the watchdog task, so a slow notifier delays the
/// next cycle but never blocks command dispatch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: Alert);
}

/// Writes every alert to the log at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: Alert) {
        warn!(
            mean_ms = alert.mean.as_millis() as u64,
            stddev_ms = alert.stddev.as_millis() as u64,
            threshold_ms = alert.threshold.as_millis() as u64,
            timestamp = %alert.timestamp.to_rfc3339(),
            "Average round-trip latency exceeds threshold"
        );
    }
}

/// Forwards alerts over a channel to whoever owns the receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertNotifier for ChannelNotifier {
    async fn notify(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            warn!("Failed to forward latency alert: receiver dropped.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn alert() -> Alert {
        Alert {
            mean: Duration::from_millis(1600),
            stddev: Duration::from_millis(141),
            threshold: Duration::from_secs(1),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards_alerts() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let sent = alert();
        notifier.notify(sent.clone()).await;

        assert_eq!(rx.recv().await, Some(sent));
    }

    #[tokio::test]
    async fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(alert()).await;
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_alerts() {
        LogNotifier.notify(alert()).await;
    }
}
