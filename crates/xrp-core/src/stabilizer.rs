#![forbid(unsafe_code)]

//! Debounced value stabilization.
//!
//! A [`StableValue`] pairs an immediate **dirty** value with a **stable** value
//! that only catches up once the dirty value has been left alone for the
//! configured quiet period. Rapid scrubbing of a slider or toggle therefore
//! produces a single promotion instead of one per intermediate value.
//!
//! # Timers
//!
//! The stabilizer owns no timer. Every [`set`](StableValue::set) returns a
//! [`SettleToken`]; the caller arranges for [`settle`](StableValue::settle) to
//! be called with that token once the delay has elapsed. A newer `set`
//! invalidates all older tokens, which is how a restarted timer "cancels" the
//! previous one.
//!
//! # Invariants
//!
//! 1. `dirty()` reflects the latest `set` synchronously.
//! 2. `stable()` only changes inside `settle`, and only for the newest token
//!    once `delay` has fully elapsed since the matching `set`.
//! 3. A promotion is reported at most once per token, and never when the
//!    value equals the current stable value.
//! 4. After [`cancel`](StableValue::cancel) no outstanding token can promote.

use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default quiet period before a dirty value is promoted.
pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_millis(1000);

/// Configuration for a [`StableValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerConfig {
    /// How long the dirty value must stay unchanged before promotion.
    /// Default: 1000ms
    pub delay: Duration,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_CONFIRMATION_DELAY,
        }
    }
}

impl StabilizerConfig {
    /// Configuration with a custom delay.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Identifies one `set` call. Only the newest token can promote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettleToken(u64);

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    set_at: Instant,
}

// ---------------------------------------------------------------------------
// StableValue
// ---------------------------------------------------------------------------

/// A value with an immediate view and a debounced view.
#[derive(Debug, Clone)]
pub struct StableValue<T> {
    config: StabilizerConfig,
    dirty: T,
    stable: T,
    generation: u64,
    pending: Option<Pending>,
    /// Diagnostic: total promotions.
    promotions: u64,
}

impl<T: Clone + PartialEq> StableValue<T> {
    /// Create a stabilizer where both views start at `initial`.
    #[must_use]
    pub fn new(initial: T, config: StabilizerConfig) -> Self {
        Self {
            config,
            dirty: initial.clone(),
            stable: initial,
            generation: 0,
            pending: None,
            promotions: 0,
        }
    }

    /// Update the dirty value and restart the quiet period.
    ///
    /// Returns the token to hand back to [`settle`](Self::settle) after
    /// [`delay`](Self::delay) has elapsed.
    pub fn set(&mut self, value: T, now: Instant) -> SettleToken {
        self.dirty = value;
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(Pending {
            generation: self.generation,
            set_at: now,
        });
        SettleToken(self.generation)
    }

    /// Attempt to promote the dirty value for `token`.
    ///
    /// Returns the newly stable value when a promotion happened. Stale tokens,
    /// early calls, and promotions to an unchanged value return `None`.
    pub fn settle(&mut self, token: SettleToken, now: Instant) -> Option<&T> {
        let pending = self.pending?;
        if pending.generation != token.0 {
            crate::trace!(
                token = token.0,
                current = pending.generation,
                "stale settle token ignored"
            );
            return None;
        }
        if now.saturating_duration_since(pending.set_at) < self.config.delay {
            return None;
        }

        self.pending = None;
        if self.dirty == self.stable {
            return None;
        }

        self.stable = self.dirty.clone();
        self.promotions += 1;
        crate::debug!(
            generation = pending.generation,
            promotions = self.promotions,
            "stable value promoted"
        );
        Some(&self.stable)
    }

    /// Drop any pending promotion. Used on teardown.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Set both views to `value` and drop any pending promotion.
    ///
    /// Outstanding tokens become stale.
    pub fn reset(&mut self, value: T) {
        self.dirty = value.clone();
        self.stable = value;
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
    }

    /// The immediate (possibly unconfirmed) value.
    #[inline]
    #[must_use]
    pub fn dirty(&self) -> &T {
        &self.dirty
    }

    /// The debounced value.
    #[inline]
    #[must_use]
    pub fn stable(&self) -> &T {
        &self.stable
    }

    /// Whether a promotion is outstanding.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The quiet period.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    /// Number of promotions so far (diagnostic).
    #[inline]
    #[must_use]
    pub fn promotion_count(&self) -> u64 {
        self.promotions
    }
}
