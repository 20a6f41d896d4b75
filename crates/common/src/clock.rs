//! Time sources for the playback clock.
//!
//! Live playback advances against a monotonic wall clock; tests and tools
//! drive the same code through a manually stepped clock so every frame
//! lands on a known time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Something that reports the current wall-clock time in milliseconds.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin. Must never decrease.
    fn now_ms(&self) -> f64;
}

/// A monotonic clock anchored to the moment it was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl TimeSource for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to. Cloning shares the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: f64) {
        let now = self.now_ms();
        self.set(now + delta_ms.max(0.0));
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Convert scene milliseconds to encoder microseconds.
pub fn ms_to_us(ms: f64) -> u64 {
    (ms.max(0.0) * 1000.0).round() as u64
}

/// Convert encoder microseconds back to scene milliseconds.
pub fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::start();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(a < 1000.0);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(10.0);
        let handle = clock.clone();
        handle.advance(16.5);
        assert!((clock.now_ms() - 26.5).abs() < 1e-9);
        clock.set(5.0);
        assert!((handle.now_ms() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_manual_clock_ignores_negative_advance() {
        let clock = ManualClock::new(100.0);
        clock.advance(-50.0);
        assert_eq!(clock.now_ms(), 100.0);
    }

    #[test]
    fn test_ms_us_conversion() {
        assert_eq!(ms_to_us(33.333), 33_333);
        assert_eq!(ms_to_us(-1.0), 0);
        assert!((us_to_ms(1_500) - 1.5).abs() < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn prop_frame_timestamps_are_monotonic(frame in 0u64..100_000, fps in 1.0f64..240.0) {
            let a = ms_to_us(frame as f64 * 1000.0 / fps);
            let b = ms_to_us((frame + 1) as f64 * 1000.0 / fps);
            proptest::prop_assert!(b > a);
        }
    }
}
