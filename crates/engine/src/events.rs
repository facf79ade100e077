// crates/engine/src/events.rs
//! Progress fan-out to subscribers.
//!
//! Delivery is best-effort over bounded broadcast channels: a slow or
//! absent subscriber never blocks job processing. When a subscriber falls
//! behind, the channel drops its oldest updates and the feed resumes at
//! the next live snapshot.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::progress::ProgressSnapshot;

/// A subscription to progress snapshots. Per-job feeds yield the current
/// snapshot once as a baseline before live updates; the engine-wide feed
/// has no single baseline. Dropping the feed unsubscribes.
pub struct ProgressFeed {
    baseline: Option<ProgressSnapshot>,
    rx: broadcast::Receiver<ProgressSnapshot>,
}

impl ProgressFeed {
    pub(crate) fn with_baseline(
        baseline: ProgressSnapshot,
        rx: broadcast::Receiver<ProgressSnapshot>,
    ) -> Self {
        Self {
            baseline: Some(baseline),
            rx,
        }
    }

    pub(crate) fn live(rx: broadcast::Receiver<ProgressSnapshot>) -> Self {
        Self { baseline: None, rx }
    }

    /// Next snapshot, or `None` once the engine is gone.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        if let Some(baseline) = self.baseline.take() {
            return Some(baseline);
        }
        loop {
            match self.rx.recv().await {
                Ok(snap) => return Some(snap),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "progress subscriber lagged, oldest updates dropped");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant: the next snapshot if one is ready.
    pub fn try_recv(&mut self) -> Option<ProgressSnapshot> {
        if let Some(baseline) = self.baseline.take() {
            return Some(baseline);
        }
        loop {
            match self.rx.try_recv() {
                Ok(snap) => return Some(snap),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "progress subscriber lagged, oldest updates dropped");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
