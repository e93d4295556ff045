#![forbid(unsafe_code)]

//! Time sources.
//!
//! Everything time-dependent in the panel reads the clock it was handed, so
//! tests can swap the wall clock for a [`ManualClock`] and step through expiry
//! windows and settle delays without sleeping.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic instant, used for timers and dirty-flag expiry.
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch, used for license end dates.
    fn epoch_secs(&self) -> f64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct ManualState {
    instant: Instant,
    epoch_secs: f64,
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hold one handle while
/// the model under test holds another.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Start at the current instant and the given epoch time.
    #[must_use]
    pub fn new(epoch_secs: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                instant: Instant::now(),
                epoch_secs,
            })),
        }
    }

    /// Move both time bases forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.instant += by;
        state.epoch_secs += by.as_secs_f64();
    }

    /// Jump the wall clock without touching the monotonic instant.
    pub fn set_epoch_secs(&self, epoch_secs: f64) {
        self.lock().epoch_secs = epoch_secs;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.lock();
        f.debug_struct("ManualClock")
            .field("epoch_secs", &state.epoch_secs)
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().instant
    }

    fn epoch_secs(&self) -> f64 {
        self.lock().epoch_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_both_bases() {
        let clock = ManualClock::new(1_000.0);
        let start = clock.now();

        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.now() - start, Duration::from_millis(1500));
        assert!((clock.epoch_secs() - 1_001.5).abs() < 1e-9);
    }

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::new(0.0);
        let other = clock.clone();

        other.advance(Duration::from_secs(3));
        other.set_epoch_secs(42.0);

        assert_eq!(clock.now(), other.now());
        assert_eq!(clock.epoch_secs(), 42.0);
    }

    #[test]
    fn system_clock_is_past_epoch() {
        assert!(SystemClock.epoch_secs() > 1_600_000_000.0);
    }
}
