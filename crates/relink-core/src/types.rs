//! Core time types for the link supervisor.
//!
//! All lifecycle decisions compare and subtract timestamps; nothing ever
//! needs wall-clock time. Timestamps are therefore monotonic milliseconds
//! from an arbitrary origin (process start for the system source), which
//! keeps them immune to clock adjustments.

use core::fmt;
use core::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Monotonic millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a timestamp from raw milliseconds.
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the raw milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Duration elapsed since an earlier timestamp (zero if `other` is later).
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of monotonic timestamps.
///
/// Injected into the controller so tests can drive time by hand instead of
/// sleeping.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// System implementation backed by [`Instant`], anchored at construction.
#[derive(Debug, Clone)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u64)
    }
}

/// Hand-driven time source for deterministic tests.
///
/// Clones share the same underlying clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    millis: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute value.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let a = Timestamp::new(1_000);
        let b = Timestamp::new(4_500);

        assert_eq!(b - a, 3_500);
        assert_eq!(a + 500, Timestamp::new(1_500));
        assert_eq!(b.duration_since(a), core::time::Duration::from_millis(3_500));
    }

    #[test]
    fn test_subtraction_saturates() {
        let earlier = Timestamp::new(100);
        let later = Timestamp::new(200);

        assert_eq!(earlier - later, 0);
        assert_eq!(earlier.duration_since(later), core::time::Duration::ZERO);
    }

    #[test]
    fn test_manual_source_is_shared_across_clones() {
        let clock = ManualTimeSource::new();
        let observer = clock.clone();

        clock.advance(250);
        assert_eq!(observer.now(), Timestamp::new(250));

        clock.set(1_000);
        assert_eq!(observer.now(), Timestamp::new(1_000));
    }

    #[test]
    fn test_monotonic_source_does_not_go_backwards() {
        let clock = MonotonicTimeSource::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
