//! Property tests for remaining-time formatting and trial selection.

use proptest::prelude::*;
use xrp_core::entitlement::{feature_enabled, time_remaining_text, trial_time_remaining};
use xrp_core::license::{Feature, FeatureStatus, License};

const HOUR: f64 = 3600.0;
const DAY: f64 = 86_400.0;
const NOW: f64 = 1_700_000_000.0;

proptest! {
    #[test]
    fn non_positive_is_silent(seconds in -1.0e9f64..=0.0) {
        prop_assert_eq!(time_remaining_text(Some(seconds)), None);
    }

    #[test]
    fn under_an_hour(seconds in 0.001f64..HOUR) {
        let text = time_remaining_text(Some(seconds));
        prop_assert_eq!(text.as_deref(), Some("less than an hour"));
    }

    #[test]
    fn hour_band_floors(hours in 1u32..24, frac in 0.0f64..1.0) {
        let text = time_remaining_text(Some((f64::from(hours) + frac * 0.999) * HOUR));
        let expected = if hours == 1 { "1 hour".to_string() } else { format!("{hours} hours") };
        prop_assert_eq!(text, Some(expected));
    }

    #[test]
    fn day_band_floors(days in 1u32..30, frac in 0.0f64..1.0) {
        let text = time_remaining_text(Some((f64::from(days) + frac * 0.999) * DAY));
        let expected = if days == 1 { "1 day".to_string() } else { format!("{days} days") };
        prop_assert_eq!(text, Some(expected));
    }

    #[test]
    fn beyond_thirty_days_is_silent(seconds in (30.0 * DAY)..1.0e10) {
        prop_assert_eq!(time_remaining_text(Some(seconds)), None);
    }

    #[test]
    fn earliest_future_trial_wins(offsets in proptest::collection::vec(-10_000.0f64..10_000.0, 1..8)) {
        let license = offsets.iter().enumerate().fold(License::new("hw"), |license, (i, off)| {
            license.with_feature(format!("f{i}"), Feature::new(FeatureStatus::Trial).ending_at(NOW + off))
        });

        let expected = offsets
            .iter()
            .map(|o| NOW + o)
            .filter(|end| *end > NOW)
            .min_by(f64::total_cmp)
            .map(|end| end - NOW);
        let actual = trial_time_remaining(Some(&license), NOW);

        match expected {
            Some(e) => prop_assert!((actual.unwrap_or(f64::NAN) - e).abs() < 1e-6),
            None => prop_assert_eq!(actual, None),
        }
    }

    #[test]
    fn off_features_never_enabled(end in proptest::option::of(-1.0e6f64..1.0e6)) {
        let feature = match end {
            Some(e) => Feature::new(FeatureStatus::Off).ending_at(NOW + e),
            None => Feature::new(FeatureStatus::Off),
        };
        let license = License::new("hw").with_feature("sbs", feature);
        prop_assert!(!feature_enabled(Some(&license), "sbs", NOW));
    }
}

#[test]
fn documented_boundaries() {
    assert_eq!(time_remaining_text(None), None);
    assert_eq!(time_remaining_text(Some(0.0)), None);
    assert_eq!(time_remaining_text(Some(HOUR)).as_deref(), Some("1 hour"));
    assert_eq!(time_remaining_text(Some(2.0 * HOUR)).as_deref(), Some("2 hours"));
    assert_eq!(time_remaining_text(Some(30.0 * DAY - 1.0)).as_deref(), Some("29 days"));
    assert_eq!(time_remaining_text(Some(30.0 * DAY)), None);
}
