//! Connection recovery (spec §4.6): if the front end has been
//! disconnected from the editor longer than `STUCK_THRESHOLD` while the
//! editor still appears reachable, force a bounded number of reconnect
//! attempts rather than waiting indefinitely on the normal discovery
//! cadence.

use crate::discovery::probe_available;
use mcpbridge_config::constants::{STUCK_MAX_FORCED_RECONNECTS, STUCK_THRESHOLD};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

/// Tracks how long the front end has been disconnected and whether a
/// stuck-detection episode (with its own bounded reconnect budget) is
/// already in progress.
pub struct StuckDetector {
    disconnected_since: Mutex<Option<Instant>>,
    forced_attempts_this_episode: AtomicU32,
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self {
            disconnected_since: Mutex::new(None),
            forced_attempts_this_episode: AtomicU32::new(0),
        }
    }
}

impl StuckDetector {
    pub async fn on_disconnected(&self) {
        let mut since = self.disconnected_since.lock().await;
        if since.is_none() {
            *since = Some(Instant::now());
            self.forced_attempts_this_episode.store(0, Ordering::SeqCst);
        }
    }

    pub async fn on_connected(&self) {
        *self.disconnected_since.lock().await = None;
        self.forced_attempts_this_episode.store(0, Ordering::SeqCst);
    }

    /// Whether, right now, a forced reconnect attempt should be made:
    /// disconnected longer than `STUCK_THRESHOLD`, the editor still
    /// probes as reachable, and the per-episode budget isn't exhausted.
    pub async fn should_force_reconnect(&self, port: u16) -> bool {
        let since = *self.disconnected_since.lock().await;
        let Some(since) = since else { return false };

        if since.elapsed() < STUCK_THRESHOLD {
            return false;
        }
        if self.forced_attempts_this_episode.load(Ordering::SeqCst) >= STUCK_MAX_FORCED_RECONNECTS
        {
            return false;
        }
        probe_available(port).await
    }

    pub fn record_forced_attempt(&self) {
        self.forced_attempts_this_episode.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_detector_never_forces_reconnect() {
        let detector = StuckDetector::default();
        assert!(!detector.should_force_reconnect(1).await);
    }

    #[tokio::test]
    async fn connecting_clears_the_disconnected_timer() {
        let detector = StuckDetector::default();
        detector.on_disconnected().await;
        detector.on_connected().await;
        assert!(!detector.should_force_reconnect(1).await);
    }

    #[tokio::test]
    async fn budget_is_bounded_per_episode() {
        let detector = StuckDetector::default();
        detector.on_disconnected().await;
        for _ in 0..STUCK_MAX_FORCED_RECONNECTS {
            detector.record_forced_attempt();
        }
        // Even ignoring the threshold/probe gates, the budget alone caps it.
        assert_eq!(
            detector.forced_attempts_this_episode.load(Ordering::SeqCst),
            STUCK_MAX_FORCED_RECONNECTS
        );
    }
}
