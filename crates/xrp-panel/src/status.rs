#![forbid(unsafe_code)]

//! Supporter-tier status row and gated feature labels.

use serde::Serialize;
use xrp_core::entitlement::{SupporterTierDetails, feature_details};
use xrp_core::license::License;

/// What the supporter-tier row shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SupporterTierStatus {
    /// A supporter feature is on trial.
    Trial { ends_in: Option<String> },
    /// The tier is active.
    Active {
        lifetime: bool,
        access_ends_in: Option<String>,
        /// Expiry is close enough to offer renewal.
        renewable: bool,
    },
    /// Nothing granted.
    Locked,
}

impl SupporterTierStatus {
    #[must_use]
    pub fn from_details(details: &SupporterTierDetails) -> Self {
        if details.trial_time_remaining.is_some_and(|s| s > 0.0) {
            return Self::Trial {
                ends_in: details.trial_time_remaining_text.clone(),
            };
        }
        if details.active {
            let access_ends_in = details.time_remaining_text.clone();
            return Self::Active {
                lifetime: details.lifetime_access,
                renewable: access_ends_in.is_some(),
                access_ends_in,
            };
        }
        Self::Locked
    }

    /// Short badge text.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Trial { ends_in: Some(t) } => format!("Trial ends in {t}"),
            Self::Trial { ends_in: None } => "Trial".to_string(),
            Self::Active { lifetime: true, .. } => "Lifetime".to_string(),
            Self::Active {
                access_ends_in: Some(t),
                ..
            } => format!("Unlocked, access ends in {t}"),
            Self::Active { .. } => "Unlocked".to_string(),
            Self::Locked => "Locked".to_string(),
        }
    }

    /// Label of the button that opens enrollment, if one is shown.
    #[must_use]
    pub fn action_label(&self) -> Option<&'static str> {
        match self {
            Self::Trial { .. } => Some("Become a supporter"),
            Self::Active { renewable: true, .. } => Some("Renew now"),
            Self::Active { .. } => None,
            Self::Locked => Some("Unlock now"),
        }
    }
}

/// One gated feature as the panel presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureLabel {
    pub name: String,
    pub details: Option<String>,
    pub locked: bool,
}

/// Labels for each named feature.
#[must_use]
pub fn feature_labels(license: Option<&License>, names: &[String], now: f64) -> Vec<FeatureLabel> {
    names
        .iter()
        .map(|name| {
            let details = feature_details(license, name, now);
            FeatureLabel {
                name: name.clone(),
                details: details.subtext,
                locked: !details.enabled,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrp_core::license::{Feature, FeatureStatus};

    const NOW: f64 = 1_700_000_000.0;

    #[test]
    fn trial_wins_over_active() {
        let details = SupporterTierDetails {
            active: true,
            trial_time_remaining: Some(7200.0),
            trial_time_remaining_text: Some("2 hours".into()),
            ..SupporterTierDetails::default()
        };
        let status = SupporterTierStatus::from_details(&details);
        assert_eq!(
            status,
            SupporterTierStatus::Trial {
                ends_in: Some("2 hours".into())
            }
        );
        assert_eq!(status.action_label(), Some("Become a supporter"));
    }

    #[test]
    fn active_statuses() {
        let lifetime = SupporterTierDetails {
            active: true,
            lifetime_access: true,
            ..SupporterTierDetails::default()
        };
        let status = SupporterTierStatus::from_details(&lifetime);
        assert_eq!(status.label(), "Lifetime");
        assert_eq!(status.action_label(), None);

        let expiring = SupporterTierDetails {
            active: true,
            time_remaining_text: Some("3 days".into()),
            ..SupporterTierDetails::default()
        };
        let status = SupporterTierStatus::from_details(&expiring);
        assert_eq!(status.action_label(), Some("Renew now"));
        assert_eq!(status.label(), "Unlocked, access ends in 3 days");
    }

    #[test]
    fn nothing_is_locked() {
        let status = SupporterTierStatus::from_details(&SupporterTierDetails::default());
        assert_eq!(status, SupporterTierStatus::Locked);
        assert_eq!(status.action_label(), Some("Unlock now"));
    }

    #[test]
    fn labels_follow_entitlements() {
        let license = License::new("hw")
            .with_feature("sbs", Feature::new(FeatureStatus::Trial).ending_at(NOW + 7200.0));
        let names = vec!["sbs".to_string(), "smooth_follow".to_string()];
        let labels = feature_labels(Some(&license), &names, NOW);

        assert!(!labels[0].locked);
        assert_eq!(labels[0].details.as_deref(), Some("Trial feature: 2 hours left"));
        assert!(labels[1].locked);
        assert_eq!(labels[1].details.as_deref(), Some("Supporter Tier feature"));
    }
}
