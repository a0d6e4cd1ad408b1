//! Frame pacing.
//!
//! Bounds batch production to the configured frame rate: after each frame
//! is produced, sleep for whatever remains of the `1/fps` interval. This
//! is a rate *governor* — a batch of N frames takes at least `N/fps`
//! wall-clock seconds, with no upper bound when production is slow.

use std::time::{Duration, Instant};

/// Sleeps away the remainder of each frame interval.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Pacer for `fps` frames per second. An fps of 0 is clamped to 1.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
        }
    }

    /// The target interval between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until `frame_started + 1/fps`, or return immediately if
    /// production already took longer than the interval.
    pub async fn pace(&self, frame_started: Instant) {
        let elapsed = frame_started.elapsed();
        if elapsed < self.interval {
            tokio::time::sleep(self.interval - elapsed).await;
        }
    }
}
