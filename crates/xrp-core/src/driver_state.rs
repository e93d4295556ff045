#![forbid(unsafe_code)]

//! Polled driver state and the control flags the panel can write.

use serde::{Deserialize, Serialize};

use crate::license::License;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationSetup {
    #[default]
    Automatic,
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationState {
    #[default]
    NotCalibrated,
    Calibrating,
    Calibrated,
    WaitingOnUser,
}

/// Authoritative snapshot read from the driver once per poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverState {
    pub heartbeat: u64,
    pub connected_device_brand: Option<String>,
    pub connected_device_model: Option<String>,
    pub calibration_setup: CalibrationSetup,
    pub calibration_state: CalibrationState,
    pub sbs_mode_enabled: bool,
    pub sbs_mode_supported: bool,
    pub firmware_update_recommended: bool,
    pub device_license: Option<License>,
}

impl DriverState {
    /// Whether both brand and model are reported.
    #[must_use]
    pub fn device_connected(&self) -> bool {
        matches!(
            (&self.connected_device_brand, &self.connected_device_model),
            (Some(brand), Some(model)) if !brand.is_empty() && !model.is_empty()
        )
    }

    /// `"{brand} {model}"`, or `"No device connected"`.
    #[must_use]
    pub fn device_name(&self) -> String {
        match (&self.connected_device_brand, &self.connected_device_model) {
            (Some(brand), Some(model)) if self.device_connected() => format!("{brand} {model}"),
            _ => "No device connected".to_string(),
        }
    }

    /// The glasses need a firmware update before SBS can be enabled.
    #[must_use]
    pub fn sbs_firmware_update_needed(&self) -> bool {
        !self.sbs_mode_supported && self.firmware_update_recommended
    }

    /// Device brand, or empty when nothing is connected.
    #[must_use]
    pub fn device_brand(&self) -> &str {
        self.connected_device_brand.as_deref().unwrap_or_default()
    }
}

/// Requested side-by-side transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SbsModeControl {
    #[default]
    Unset,
    Enable,
    Disable,
}

impl SbsModeControl {
    /// Control value for a toggle position.
    #[must_use]
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Enable } else { Self::Disable }
    }

    /// The `sbs_mode_enabled` value this control intends, if any.
    #[must_use]
    pub fn intended(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Enable => Some(true),
            Self::Disable => Some(false),
        }
    }
}

/// A partial set of control flags; only `Some` fields are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recenter_screen: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recalibrate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbs_mode: Option<SbsModeControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_device_license: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_features: Option<Vec<String>>,
}

impl ControlFlags {
    #[must_use]
    pub fn recenter() -> Self {
        Self {
            recenter_screen: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn recalibrate() -> Self {
        Self {
            recalibrate: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sbs_mode(enabled: bool) -> Self {
        Self {
            sbs_mode: Some(SbsModeControl::from_enabled(enabled)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn refresh_device_license() -> Self {
        Self {
            refresh_device_license: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn request_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            request_features: Some(features.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// True when no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
