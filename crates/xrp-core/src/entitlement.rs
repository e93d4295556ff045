#![forbid(unsafe_code)]

//! Entitlement evaluation over a [`License`] snapshot.
//!
//! Every function here is pure and total over `Option<&License>`: an absent
//! license simply evaluates as "nothing granted". The current time is always
//! passed in explicitly (`now`, epoch seconds) so results are reproducible.
//!
//! # Remaining-time rule
//!
//! `remaining = end_date - now`, with a missing `end_date` treated as
//! `+inf`. A grant is live only while `remaining > 0`. Tiers additionally
//! treat the legacy `funds_to_renew = true` flag as unbounded.
//!
//! # Display policy
//!
//! [`time_remaining_text`] hides anything 30 days or further
//! out, so far-future expirations are never surfaced to the user.

use serde::Serialize;

use crate::license::{Feature, FeatureStatus, License, SUPPORTER_FEATURE_NAMES, Tier};

const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;
const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;

/// Expirations closer than this many hours are shown in hours.
pub const END_DATE_WARN_HOURS: f64 = 24.0;

/// Expirations closer than this many days are shown at all.
pub const END_DATE_WARN_DAYS: f64 = 30.0;

/// Seconds until `end_date`, or `+inf` when there is no end date.
#[inline]
#[must_use]
pub fn seconds_remaining(end_date: Option<f64>, now: f64) -> f64 {
    end_date.unwrap_or(f64::INFINITY) - now
}

/// Seconds remaining on a tier.
///
/// A missing tier, a missing end date, or an outstanding legacy renewal
/// (`funds_to_renew = true`) all count as unbounded.
#[must_use]
pub fn tier_seconds_remaining(tier: Option<&Tier>, now: f64) -> f64 {
    match tier {
        Some(tier) if tier.funds_to_renew == Some(true) => f64::INFINITY,
        Some(tier) => seconds_remaining(tier.end_date, now),
        None => f64::INFINITY,
    }
}

fn lookup_feature<'a>(license: Option<&'a License>, name: &str) -> Option<&'a Feature> {
    license.and_then(|l| l.feature(name))
}

/// Whether the named feature is currently usable.
///
/// True iff the feature exists, its status is `trial` or `on`, and it has not
/// expired.
#[must_use]
pub fn feature_enabled(license: Option<&License>, name: &str, now: f64) -> bool {
    lookup_feature(license, name).is_some_and(|f| {
        f.status.grants_access() && seconds_remaining(f.end_date, now) > 0.0
    })
}

/// Status line shown under a gated feature's control.
#[must_use]
pub fn feature_subtext(license: Option<&License>, name: &str, now: f64) -> Option<String> {
    let Some(feature) = lookup_feature(license, name).filter(|f| f.status != FeatureStatus::Off) else {
        return Some("Supporter Tier feature".to_string());
    };

    let remaining = seconds_remaining(feature.end_date, now);
    if remaining <= 0.0 {
        return match feature.status {
            FeatureStatus::On => Some("Supporter Tier expired".to_string()),
            FeatureStatus::Trial => Some("Trial period expired".to_string()),
            FeatureStatus::Off => None,
        };
    }

    if let Some(left) = time_remaining_text(Some(remaining)) {
        return match feature.status {
            FeatureStatus::On => Some(format!("Supporter Tier: {left} left")),
            FeatureStatus::Trial => Some(format!("Trial feature: {left} left")),
            FeatureStatus::Off => None,
        };
    }

    match feature.status {
        FeatureStatus::On => Some("Supporter Tier feature".to_string()),
        FeatureStatus::Trial => Some("Supporter Tier trial feature".to_string()),
        FeatureStatus::Off => None,
    }
}

/// Human-readable remaining time, or `None` when there is nothing to show.
///
/// `None`, zero, negative and NaN inputs all yield `None`, as does anything
/// 30 days or more away.
#[must_use]
pub fn time_remaining_text(seconds: Option<f64>) -> Option<String> {
    // Zero reads the same as unknown.
    let seconds = seconds.filter(|s| *s > 0.0)?;

    if seconds < SECONDS_PER_HOUR {
        Some("less than an hour".to_string())
    } else if seconds / SECONDS_PER_HOUR < END_DATE_WARN_HOURS {
        let hours = (seconds / SECONDS_PER_HOUR).floor() as u64;
        Some(plural(hours, "hour"))
    } else if seconds / SECONDS_PER_DAY < END_DATE_WARN_DAYS {
        let days = (seconds / SECONDS_PER_DAY).floor() as u64;
        Some(plural(days, "day"))
    } else {
        None
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Seconds left on the soonest-ending live trial, across all features.
#[must_use]
pub fn trial_time_remaining(license: Option<&License>, now: f64) -> Option<f64> {
    earliest_trial_end(license, now, |_| true).map(|end| end - now)
}

/// Like [`trial_time_remaining`], restricted to the given feature names.
#[must_use]
pub fn trial_time_remaining_among(
    license: Option<&License>,
    names: &[&str],
    now: f64,
) -> Option<f64> {
    earliest_trial_end(license, now, |name| names.contains(&name)).map(|end| end - now)
}

fn earliest_trial_end(
    license: Option<&License>,
    now: f64,
    include: impl Fn(&str) -> bool,
) -> Option<f64> {
    license?
        .features
        .iter()
        .filter(|(name, f)| include(name.as_str()) && f.status == FeatureStatus::Trial)
        .filter_map(|(_, f)| f.end_date)
        .filter(|end| *end > now)
        .min_by(f64::total_cmp)
}

/// Enabled flag plus status line for one gated feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDetails {
    pub enabled: bool,
    pub subtext: Option<String>,
}

/// Evaluate [`feature_enabled`] and [`feature_subtext`] together.
#[must_use]
pub fn feature_details(license: Option<&License>, name: &str, now: f64) -> FeatureDetails {
    FeatureDetails {
        enabled: feature_enabled(license, name, now),
        subtext: feature_subtext(license, name, now),
    }
}

/// Supporter-tier summary used by the status row and the enrollment modal.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SupporterTierDetails {
    pub license_present: bool,
    pub active: bool,
    pub confirmed_token: bool,
    pub funds_needed: Option<f64>,
    pub lifetime_funds_needed: Option<f64>,
    pub lifetime_access: bool,
    pub time_remaining_text: Option<String>,
    pub trial_time_remaining: Option<f64>,
    pub trial_time_remaining_text: Option<String>,
}

/// Summarize the supporter tier of `license` at time `now`.
#[must_use]
pub fn supporter_tier_details(license: Option<&License>, now: f64) -> SupporterTierDetails {
    let tier = license.and_then(License::supporter_tier);
    let tier_remaining = tier_seconds_remaining(tier, now);
    let trial_remaining = trial_time_remaining_among(license, SUPPORTER_FEATURE_NAMES, now);
    let active = tier.is_some_and(|t| t.active) && tier_remaining > 0.0;

    SupporterTierDetails {
        license_present: license.is_some(),
        active,
        confirmed_token: license.is_some_and(|l| l.confirmed_token),
        funds_needed: tier.and_then(|t| t.funds_needed_usd),
        lifetime_funds_needed: tier.and_then(|t| t.lifetime_funds_needed_usd),
        lifetime_access: active && tier.is_some_and(|t| t.end_date.is_none()),
        time_remaining_text: time_remaining_text(Some(tier_remaining)),
        trial_time_remaining: trial_remaining,
        trial_time_remaining_text: time_remaining_text(trial_remaining),
    }
}
