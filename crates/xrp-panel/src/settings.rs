#![forbid(unsafe_code)]

//! Panel timing and behavior settings.

use std::time::Duration;

use tracing::warn;
use xrp_core::license::SUPPORTER_FEATURE_NAMES;
use xrp_core::reconciler::DEFAULT_EXPIRE_WINDOW;
use xrp_core::stabilizer::DEFAULT_CONFIRMATION_DELAY;

use crate::backend::Component;

/// Environment variable overriding [`PanelSettings::poll_interval`] (ms).
pub const ENV_POLL_INTERVAL_MS: &str = "XRP_POLL_INTERVAL_MS";
/// Environment variable overriding [`PanelSettings::dirty_expire`] (ms).
pub const ENV_DIRTY_EXPIRE_MS: &str = "XRP_DIRTY_EXPIRE_MS";
/// Environment variable overriding [`PanelSettings::headset_mode_delay`] (ms).
pub const ENV_CONFIRM_DELAY_MS: &str = "XRP_CONFIRM_DELAY_MS";
/// Environment variable overriding [`PanelSettings::vulkan_only`].
pub const ENV_VULKAN_ONLY: &str = "XRP_VULKAN_ONLY";

/// Timing and behavior knobs for [`PanelModel`](crate::panel::PanelModel).
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSettings {
    /// Delay between the end of one driver-state poll and the next.
    /// Default: 1000ms
    pub poll_interval: Duration,
    /// How long an unconfirmed control flag overrides polled state.
    /// Default: 3000ms
    pub dirty_expire: Duration,
    /// Quiet period before a headset-mode change is applied.
    /// Default: 1000ms
    pub headset_mode_delay: Duration,
    /// Wait between requesting a license refresh and re-reading state.
    /// Default: 3000ms
    pub license_settle: Duration,
    /// Delay before the enrollment modal closes after a verified token.
    /// Default: 3000ms
    pub verify_success_close: Duration,
    /// Prefer the Vulkan-only variant of tutorials.
    /// Default: true
    pub vulkan_only: bool,
    /// Component whose installation is checked at startup.
    pub component: Component,
    /// Features requested from the driver at startup and gated by the
    /// supporter tier.
    pub supporter_features: Vec<String>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            dirty_expire: DEFAULT_EXPIRE_WINDOW,
            headset_mode_delay: DEFAULT_CONFIRMATION_DELAY,
            license_settle: Duration::from_millis(3000),
            verify_success_close: Duration::from_millis(3000),
            vulkan_only: true,
            component: Component::default(),
            supporter_features: SUPPORTER_FEATURE_NAMES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl PanelSettings {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = parse_millis(&lookup, ENV_POLL_INTERVAL_MS) {
            self.poll_interval = ms;
        }
        if let Some(ms) = parse_millis(&lookup, ENV_DIRTY_EXPIRE_MS) {
            self.dirty_expire = ms;
        }
        if let Some(ms) = parse_millis(&lookup, ENV_CONFIRM_DELAY_MS) {
            self.headset_mode_delay = ms;
        }
        if let Some(raw) = lookup(ENV_VULKAN_ONLY) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.vulkan_only = true,
                "0" | "false" | "no" | "off" => self.vulkan_only = false,
                _ => warn!(key = ENV_VULKAN_ONLY, value = %raw, "ignoring invalid boolean"),
            }
        }
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_dirty_expire(mut self, window: Duration) -> Self {
        self.dirty_expire = window;
        self
    }

    #[must_use]
    pub fn with_headset_mode_delay(mut self, delay: Duration) -> Self {
        self.headset_mode_delay = delay;
        self
    }

    #[must_use]
    pub fn with_license_settle(mut self, delay: Duration) -> Self {
        self.license_settle = delay;
        self
    }

    #[must_use]
    pub fn with_verify_success_close(mut self, delay: Duration) -> Self {
        self.verify_success_close = delay;
        self
    }

    #[must_use]
    pub fn with_vulkan_only(mut self, vulkan_only: bool) -> Self {
        self.vulkan_only = vulkan_only;
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.component = component;
        self
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(key, value = %raw, "ignoring invalid millisecond value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_timings() {
        let settings = PanelSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(1000));
        assert_eq!(settings.dirty_expire, Duration::from_millis(3000));
        assert_eq!(settings.headset_mode_delay, Duration::from_millis(1000));
        assert_eq!(settings.license_settle, Duration::from_millis(3000));
        assert_eq!(settings.supporter_features, vec!["sbs", "smooth_follow"]);
    }

    #[test]
    fn overrides_apply() {
        let settings = PanelSettings::default().with_overrides(lookup(&[
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_DIRTY_EXPIRE_MS, " 5000 "),
            (ENV_VULKAN_ONLY, "off"),
        ]));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.dirty_expire, Duration::from_millis(5000));
        assert!(!settings.vulkan_only);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let settings = PanelSettings::default().with_overrides(lookup(&[
            (ENV_POLL_INTERVAL_MS, "soon"),
            (ENV_CONFIRM_DELAY_MS, "0"),
            (ENV_VULKAN_ONLY, "maybe"),
        ]));
        assert_eq!(settings, PanelSettings::default());
    }
}
