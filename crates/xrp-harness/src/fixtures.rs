#![forbid(unsafe_code)]

//! License and driver-state builders, and a ready-to-drive panel.

use std::sync::Arc;

use xrp_core::driver_state::DriverState;
use xrp_core::license::{Feature, FeatureStatus, License, SUPPORTER_TIER, Tier};
use xrp_panel::panel::{PanelModel, PanelMsg, PanelView};
use xrp_panel::settings::PanelSettings;
use xrp_runtime::{ManualClock, Model, ProgramSimulator};

use crate::backend::ScriptedBackend;
use crate::shell::RecordingShell;

/// Epoch seconds every fixture clock starts at.
pub const NOW: f64 = 1_700_000_000.0;

/// A connected device that supports side-by-side.
#[must_use]
pub fn connected(brand: &str, model: &str) -> DriverState {
    DriverState {
        connected_device_brand: Some(brand.to_string()),
        connected_device_model: Some(model.to_string()),
        sbs_mode_supported: true,
        ..DriverState::default()
    }
}

/// A license whose only grant is a trial of `feature` for `seconds`.
#[must_use]
pub fn trial_license(feature: &str, seconds: f64) -> License {
    License::new("hw-trial").with_feature(
        feature,
        Feature::new(FeatureStatus::Trial).ending_at(NOW + seconds),
    )
}

/// An active supporter tier with all supporter features on.
///
/// `remaining` of `None` is lifetime access.
#[must_use]
pub fn supporter_license(remaining: Option<f64>) -> License {
    let tier = Tier {
        active: true,
        end_date: remaining.map(|s| NOW + s),
        funds_needed_usd: Some(10.0),
        lifetime_funds_needed_usd: Some(50.0),
        funds_to_renew: None,
    };
    let feature = |f: Feature| match remaining {
        Some(s) => f.ending_at(NOW + s),
        None => f,
    };
    License::new("hw-supporter")
        .with_confirmed_token(true)
        .with_tier(SUPPORTER_TIER, tier)
        .with_feature("sbs", feature(Feature::new(FeatureStatus::On)))
        .with_feature("smooth_follow", feature(Feature::new(FeatureStatus::On)))
}

/// A present license that grants nothing.
#[must_use]
pub fn unlicensed() -> License {
    License::new("hw-free").with_tier(
        SUPPORTER_TIER,
        Tier {
            active: false,
            funds_needed_usd: Some(10.0),
            lifetime_funds_needed_usd: Some(50.0),
            ..Tier::default()
        },
    )
}

/// Decode a driver-state payload as the agent sends it.
///
/// # Errors
///
/// Fails when the JSON does not match the wire shape.
pub fn decode_driver_state(json: &str) -> serde_json::Result<DriverState> {
    serde_json::from_str(json)
}

/// A [`PanelModel`] on a [`ProgramSimulator`], wired to a scripted backend
/// and a recording shell that share one manual clock.
pub struct PanelFixture {
    pub sim: ProgramSimulator<PanelModel>,
    pub backend: Arc<ScriptedBackend>,
    pub shell: RecordingShell,
    pub clock: ManualClock,
}

impl PanelFixture {
    /// Start with default settings, Vulkan-only tutorials off.
    #[must_use]
    pub fn start(backend: ScriptedBackend) -> Self {
        Self::start_with(backend, PanelSettings::default().with_vulkan_only(false))
    }

    /// Build and initialize the panel.
    #[must_use]
    pub fn start_with(backend: ScriptedBackend, settings: PanelSettings) -> Self {
        let backend = Arc::new(backend);
        let shell = RecordingShell::new();
        let clock = ManualClock::new(NOW);
        let model = PanelModel::new(
            backend.clone(),
            Arc::new(shell.clone()),
            Arc::new(clock.clone()),
            settings,
        );
        let mut sim = ProgramSimulator::with_clock(model, clock.clone());
        sim.init();
        Self {
            sim,
            backend,
            shell,
            clock,
        }
    }

    pub fn send(&mut self, msg: PanelMsg) {
        self.sim.send(msg);
    }

    #[must_use]
    pub fn view(&self) -> PanelView {
        self.sim.model().view()
    }

    #[must_use]
    pub fn model(&self) -> &PanelModel {
        self.sim.model()
    }
}
