#![forbid(unsafe_code)]

//! License snapshot as reported by the driver.
//!
//! A [`License`] is a plain value: it is decoded once per poll cycle and never
//! mutated afterwards. Signature checks happen upstream; this module only
//! models the shape of the payload.
//!
//! All timestamps are Unix epoch **seconds** (`f64`, since the driver may emit
//! fractional values).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the tier that unlocks supporter features.
pub const SUPPORTER_TIER: &str = "supporter";

/// Feature names that belong to the supporter tier.
pub const SUPPORTER_FEATURE_NAMES: &[&str] = &["sbs", "smooth_follow"];

/// Grant status of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    /// Not granted. Any `end_date` is meaningless.
    #[default]
    Off,
    /// Granted for a limited trial window.
    Trial,
    /// Granted through an active tier.
    On,
}

impl FeatureStatus {
    /// Whether this status grants access (subject to the end date).
    #[inline]
    #[must_use]
    pub fn grants_access(self) -> bool {
        matches!(self, Self::Trial | Self::On)
    }
}

/// A time-bounded feature grant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub status: FeatureStatus,
    /// Expiry in epoch seconds. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<f64>,
}

impl Feature {
    /// A feature with the given status and no expiry.
    #[must_use]
    pub fn new(status: FeatureStatus) -> Self {
        Self {
            status,
            end_date: None,
        }
    }

    /// Builder: set the expiry.
    #[must_use]
    pub fn ending_at(mut self, end_date: f64) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// A named subscription tier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub active: bool,
    /// Expiry in epoch seconds. `None` means lifetime access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<f64>,
    #[serde(
        default,
        rename = "fundsNeededUSD",
        skip_serializing_if = "Option::is_none"
    )]
    pub funds_needed_usd: Option<f64>,
    #[serde(
        default,
        rename = "lifetimeFundsNeededUSD",
        skip_serializing_if = "Option::is_none"
    )]
    pub lifetime_funds_needed_usd: Option<f64>,
    /// Legacy flag: a renewal cost applies and `end_date` must be ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funds_to_renew: Option<bool>,
}

/// License snapshot pulled from the driver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    #[serde(default)]
    pub hardware_id: String,
    /// Whether the device has validated a donor token.
    #[serde(default)]
    pub confirmed_token: bool,
    #[serde(default)]
    pub tiers: BTreeMap<String, Tier>,
    #[serde(default)]
    pub features: BTreeMap<String, Feature>,
}

impl License {
    /// An empty license for the given hardware id.
    #[must_use]
    pub fn new(hardware_id: impl Into<String>) -> Self {
        Self {
            hardware_id: hardware_id.into(),
            ..Self::default()
        }
    }

    /// Builder: mark the donor token as confirmed.
    #[must_use]
    pub fn with_confirmed_token(mut self, confirmed: bool) -> Self {
        self.confirmed_token = confirmed;
        self
    }

    /// Builder: insert or replace a tier.
    #[must_use]
    pub fn with_tier(mut self, name: impl Into<String>, tier: Tier) -> Self {
        self.tiers.insert(name.into(), tier);
        self
    }

    /// Builder: insert or replace a feature grant.
    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, feature: Feature) -> Self {
        self.features.insert(name.into(), feature);
        self
    }

    /// Look up a feature grant by name.
    #[inline]
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    /// Look up a tier by name.
    #[inline]
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.get(name)
    }

    /// The supporter tier, if the driver reported one.
    #[inline]
    #[must_use]
    pub fn supporter_tier(&self) -> Option<&Tier> {
        self.tier(SUPPORTER_TIER)
    }
}
