#![forbid(unsafe_code)]

//! Optimistic control-flag reconciliation.
//!
//! When the user triggers a control action, the panel writes a partial
//! [`ControlFlags`] to the driver and, once the write is acknowledged, records
//! it here as the current **dirty** batch. While a flag is dirty the panel
//! displays the intended outcome instead of the last polled driver value.
//!
//! Each poll then reconciles the batch against the fresh [`DriverState`]:
//!
//! 1. If the batch is older than the expire window it is dropped
//!    unconditionally ([`ClearReason::Expired`]).
//! 2. Otherwise every flag whose intended effect is now visible in the driver
//!    state is dropped; once none remain the batch is cleared
//!    ([`ClearReason::Confirmed`]).
//!
//! # Invariants
//!
//! - At most one batch is tracked. Issuing while a batch is pending replaces
//!   it (last write wins); earlier flags lose their confirmation tracking.
//! - A dirty batch never outlives `expire_window` by more than one poll.
//! - Flags with no observable echo (`recenter_screen`,
//!   `refresh_device_license`, `request_features`) only clear by expiry.

use std::time::{Duration, Instant};

use crate::driver_state::{CalibrationState, ControlFlags, DriverState};

/// Default bound on how long an unconfirmed intent may override real state.
pub const DEFAULT_EXPIRE_WINDOW: Duration = Duration::from_millis(3000);

/// Configuration for [`ControlReconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Age after which a dirty batch is discarded.
    /// Default: 3000ms
    pub expire_window: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            expire_window: DEFAULT_EXPIRE_WINDOW,
        }
    }
}

/// Why a dirty batch was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearReason {
    /// The driver state now reflects every dirty flag.
    Confirmed,
    /// The batch outlived the expire window.
    Expired,
}

impl ClearReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
        }
    }
}

/// Locally issued, not yet confirmed control flags.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyControlFlags {
    pub flags: ControlFlags,
    pub last_updated: Instant,
}

impl DirtyControlFlags {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_updated) > window
    }

    /// Drop every flag the driver state already reflects.
    fn drop_confirmed(&mut self, state: &DriverState) {
        let flags = &mut self.flags;

        if flags
            .sbs_mode
            .is_some_and(|sbs| sbs.intended().is_none_or(|want| want == state.sbs_mode_enabled))
        {
            flags.sbs_mode = None;
        }
        if flags.recalibrate.is_some_and(|requested| {
            !requested || state.calibration_state == CalibrationState::Calibrating
        }) {
            flags.recalibrate = None;
        }
        if flags.recenter_screen == Some(false) {
            flags.recenter_screen = None;
        }
        if flags.refresh_device_license == Some(false) {
            flags.refresh_device_license = None;
        }
    }
}

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub issued: u64,
    pub overwritten: u64,
    pub confirmed: u64,
    pub expired: u64,
}

/// Tracks the single outstanding dirty batch.
#[derive(Debug, Clone, Default)]
pub struct ControlReconciler {
    config: ReconcilerConfig,
    dirty: Option<DirtyControlFlags>,
    stats: ReconcilerStats,
}

impl ControlReconciler {
    #[must_use]
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            dirty: None,
            stats: ReconcilerStats::default(),
        }
    }

    /// Record an acknowledged write as the current dirty batch.
    ///
    /// Replaces any pending batch and returns it. Empty flag sets are ignored.
    pub fn issue(&mut self, flags: ControlFlags, now: Instant) -> Option<DirtyControlFlags> {
        if flags.is_empty() {
            return None;
        }
        self.stats.issued += 1;
        let previous = self.dirty.replace(DirtyControlFlags {
            flags,
            last_updated: now,
        });
        if previous.is_some() {
            self.stats.overwritten += 1;
            crate::debug!("dirty control flags overwritten by newer batch");
        }
        previous
    }

    /// Reconcile the pending batch against a freshly polled state.
    ///
    /// Returns the reason when this call cleared the batch.
    pub fn reconcile(&mut self, state: &DriverState, now: Instant) -> Option<ClearReason> {
        let dirty = self.dirty.as_mut()?;

        let reason = if dirty.is_expired(now, self.config.expire_window) {
            ClearReason::Expired
        } else {
            dirty.drop_confirmed(state);
            if !dirty.flags.is_empty() {
                return None;
            }
            ClearReason::Confirmed
        };

        self.dirty = None;
        match reason {
            ClearReason::Confirmed => self.stats.confirmed += 1,
            ClearReason::Expired => self.stats.expired += 1,
        }
        crate::debug!(reason = reason.as_str(), "dirty control flags cleared");
        Some(reason)
    }

    /// Forget the pending batch without counting it.
    pub fn clear(&mut self) {
        self.dirty = None;
    }

    /// The pending batch, if any.
    #[inline]
    #[must_use]
    pub fn dirty(&self) -> Option<&DirtyControlFlags> {
        self.dirty.as_ref()
    }

    /// Whether any flag is pending.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// SBS toggle position to display: the intent while dirty, else the
    /// polled value.
    #[must_use]
    pub fn displayed_sbs_enabled(&self, state: Option<&DriverState>) -> bool {
        self.dirty
            .as_ref()
            .and_then(|d| d.flags.sbs_mode)
            .and_then(|sbs| sbs.intended())
            .unwrap_or_else(|| state.is_some_and(|s| s.sbs_mode_enabled))
    }

    /// Whether to display the headset as calibrating.
    #[must_use]
    pub fn calibrating(&self, state: Option<&DriverState>) -> bool {
        let requested = self
            .dirty
            .as_ref()
            .is_some_and(|d| d.flags.recalibrate == Some(true));
        requested || state.is_some_and(|s| s.calibration_state == CalibrationState::Calibrating)
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn state(sbs_mode_enabled: bool) -> DriverState {
        DriverState {
            sbs_mode_enabled,
            ..DriverState::default()
        }
    }

    #[test]
    fn matching_poll_confirms_sbs_enable() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(ControlFlags::sbs_mode(true), t);
        assert!(rec.displayed_sbs_enabled(Some(&state(false))));

        assert_eq!(rec.reconcile(&state(false), t + ms(1000)), None);
        assert_eq!(
            rec.reconcile(&state(true), t + ms(2000)),
            Some(ClearReason::Confirmed)
        );
        assert!(!rec.is_dirty());
        assert_eq!(rec.stats().confirmed, 1);
    }

    #[test]
    fn unconfirmed_flag_expires_after_window() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(ControlFlags::sbs_mode(true), t);

        for offset in [1000, 2000, 3000] {
            assert_eq!(rec.reconcile(&state(false), t + ms(offset)), None);
        }
        assert_eq!(
            rec.reconcile(&state(false), t + ms(3001)),
            Some(ClearReason::Expired)
        );
        assert!(!rec.displayed_sbs_enabled(Some(&state(false))));
        assert_eq!(rec.stats().expired, 1);
    }

    #[test]
    fn expiry_wins_even_when_state_agrees() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(ControlFlags::sbs_mode(false), t);
        assert_eq!(
            rec.reconcile(&state(false), t + ms(4000)),
            Some(ClearReason::Expired)
        );
    }

    #[test]
    fn new_issue_overwrites_pending_batch() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(ControlFlags::sbs_mode(true), t);
        let previous = rec.issue(ControlFlags::recenter(), t + ms(100));

        assert_eq!(previous.unwrap().flags, ControlFlags::sbs_mode(true));
        assert_eq!(rec.dirty().unwrap().flags, ControlFlags::recenter());
        assert_eq!(rec.stats().overwritten, 1);
        // The SBS intent is no longer overlaid.
        assert!(!rec.displayed_sbs_enabled(Some(&state(false))));
    }

    #[test]
    fn recenter_only_clears_by_expiry() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(ControlFlags::recenter(), t);
        assert_eq!(rec.reconcile(&state(false), t + ms(10)), None);
        assert_eq!(
            rec.reconcile(&state(false), t + ms(3500)),
            Some(ClearReason::Expired)
        );
    }

    #[test]
    fn recalibrate_shows_calibrating_until_driver_picks_it_up() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();
        let idle = DriverState::default();
        let busy = DriverState {
            calibration_state: CalibrationState::Calibrating,
            ..DriverState::default()
        };

        rec.issue(ControlFlags::recalibrate(), t);
        assert!(rec.calibrating(Some(&idle)));
        assert_eq!(rec.reconcile(&idle, t + ms(500)), None);

        assert_eq!(
            rec.reconcile(&busy, t + ms(1000)),
            Some(ClearReason::Confirmed)
        );
        assert!(rec.calibrating(Some(&busy)));
        assert!(!rec.calibrating(Some(&idle)));
    }

    #[test]
    fn unset_sbs_is_trivially_confirmed() {
        let mut rec = ControlReconciler::default();
        let t = Instant::now();

        rec.issue(
            ControlFlags {
                sbs_mode: Some(crate::driver_state::SbsModeControl::Unset),
                ..ControlFlags::default()
            },
            t,
        );
        assert_eq!(
            rec.reconcile(&state(true), t),
            Some(ClearReason::Confirmed)
        );
    }

    #[test]
    fn empty_issue_is_ignored() {
        let mut rec = ControlReconciler::default();
        assert!(rec.issue(ControlFlags::default(), Instant::now()).is_none());
        assert!(!rec.is_dirty());
        assert_eq!(rec.stats().issued, 0);
    }

    #[test]
    fn reconcile_without_batch_is_noop() {
        let mut rec = ControlReconciler::new(ReconcilerConfig {
            expire_window: ms(10),
        });
        assert_eq!(rec.reconcile(&state(true), Instant::now()), None);
        assert_eq!(rec.config().expire_window, ms(10));
    }
}
