//! Tokio-backed time source.
//!
//! Reads `tokio::time::Instant`, so paused-clock tests see the same time
//! the timers do.

use relink_core::{TimeSource, Timestamp};
use tokio::time::Instant;

/// Monotonic time source anchored at construction, driven by the tokio
/// clock.
#[derive(Debug, Clone)]
pub struct TokioTimeSource {
    origin: Instant,
}

impl TokioTimeSource {
    /// Anchor a new source at the current instant. Must be called inside a
    /// tokio runtime.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.origin.elapsed().as_millis() as u64)
    }
}
