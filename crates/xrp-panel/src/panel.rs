#![forbid(unsafe_code)]

//! The control-panel model.
//!
//! [`PanelModel`] owns every piece of session state: the config snapshot, the
//! last polled driver state, the dirty control flags, the stabilized headset
//! mode, the don't-show-again set, and any open modal. It is only mutated in
//! [`Model::update`]; backend calls run as [`Cmd::Task`]s and come back as
//! [`PanelMsg`]s.
//!
//! # Activities
//!
//! - **Poll loop**: `Poll` fetches driver state; the result schedules the next
//!   `Poll` one interval later, so a slow backend slows the loop instead of
//!   stacking requests.
//! - **User calls**: config writes, control-flag writes, token requests.
//! - **Settle timers**: headset-mode confirmation, license refresh settle,
//!   enrollment auto-close.
//!
//! After [`PanelMsg::Teardown`] every message is dropped, so late task
//! results and timers are discarded.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use xrp_core::config::{Config, ConfigEdit, HeadsetMode};
use xrp_core::driver_state::{ControlFlags, DriverState};
use xrp_core::entitlement::{SupporterTierDetails, feature_enabled, supporter_tier_details};
use xrp_core::reconciler::{ControlReconciler, ReconcilerConfig};
use xrp_core::stabilizer::{SettleToken, StabilizerConfig, StableValue};
use xrp_runtime::{Clock, Cmd, Model};

use crate::backend::{Backend, BackendResult};
use crate::banner::{BannerSlot, ErrorBanner, Resource};
use crate::enrollment::{
    Enrollment, EnrollmentEffect, EnrollmentEvent, EnrollmentView, RefreshLicenseResponse,
};
use crate::gate::{
    DialogOutcome, GateDecision, GuidedActionGate, PendingConfirmation, TutorialPrompt,
    TutorialRegistry,
};
use crate::settings::PanelSettings;
use crate::shell::{HostShell, ModalHandle, ModalRequest};
use crate::status::{FeatureLabel, SupporterTierStatus, feature_labels};

/// Feature that gates side-by-side mode.
pub const SBS_FEATURE: &str = "sbs";
/// Feature that gates smooth follow.
pub const SMOOTH_FOLLOW_FEATURE: &str = "smooth_follow";

const SBS_FIRMWARE_DESCRIPTION: &str =
    "Update your glasses' firmware to enable side-by-side mode.";
const SBS_DESCRIPTION: &str = "Adjust virtual display depth. View 3D content.";
const RECENTER_DESCRIPTION: &str = "Or double-tap your headset.";
const RECALIBRATE_DESCRIPTION: &str = "Or triple-tap your headset.";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Component installation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstallationStatus {
    #[default]
    Checking,
    InProgress,
    Installed,
    Failed,
}

/// Actions that may sit behind a tutorial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatedAction {
    SetHeadsetMode(HeadsetMode),
    SetSbsEnabled(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelMsg {
    // --- poll loop ---
    Poll,
    DriverStateLoaded(BackendResult<DriverState>),

    // --- backend results ---
    ConfigLoaded(BackendResult<Config>),
    ConfigWritten(BackendResult<Config>),
    /// Authoritative config re-read after a failed write.
    ConfigRestored(BackendResult<Config>),
    ControlFlagsWritten {
        flags: ControlFlags,
        result: BackendResult<()>,
    },
    DontShowAgainLoaded(BackendResult<Vec<String>>),
    DontShowAgainSaved {
        key: String,
        result: BackendResult<()>,
    },
    TutorialsReset(BackendResult<()>),
    InstallChecked(BackendResult<bool>),
    InstallFinished(BackendResult<bool>),

    // --- user input ---
    EditConfig(ConfigEdit),
    /// Display size slider; edits the SBS size while SBS is on.
    SetDisplayZoom(f64),
    SelectHeadsetMode(HeadsetMode),
    SetJoystickMode(bool),
    SetSbsEnabled(bool),
    SetSmoothFollow(bool),
    Recenter,
    Recalibrate,
    ResetTutorials,
    TutorialAnswered(DialogOutcome),
    OpenSupporterTier,
    Enrollment(EnrollmentEvent),

    // --- timers ---
    HeadsetModeSettle(SettleToken),

    // --- license refresh ---
    LicenseRefreshRequested(BackendResult<()>),
    LicenseRefreshSettled,
    LicenseRefreshed(BackendResult<DriverState>),

    Teardown,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Everything the host renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub banner: Option<ErrorBanner>,
    pub installation: InstallationStatus,
    /// Installed, with config and driver state loaded.
    pub ready: bool,
    pub device_name: String,
    pub device_connected: bool,
    pub headset_mode: HeadsetMode,
    pub headset_mode_description: &'static str,
    /// Controls that need a connected, enabled headset.
    pub controls_enabled: bool,
    pub joystick_mode: bool,
    pub sbs_enabled: bool,
    pub sbs_supported: bool,
    pub sbs_description: Option<&'static str>,
    pub calibrating: bool,
    pub recalibrate_description: Option<&'static str>,
    pub recenter_enabled: bool,
    pub recenter_description: Option<&'static str>,
    /// "Show all tutorials" is offered.
    pub show_reset_tutorials: bool,
    pub supporter_status: SupporterTierStatus,
    pub features: Vec<FeatureLabel>,
    pub config: Option<Config>,
    pub enrollment: Option<EnrollmentView>,
    pub tutorial: Option<TutorialPrompt>,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

pub struct PanelModel {
    backend: Arc<dyn Backend>,
    shell: Arc<dyn HostShell>,
    clock: Arc<dyn Clock>,
    settings: PanelSettings,
    gate: GuidedActionGate,
    reconciler: ControlReconciler,
    headset_mode: StableValue<Option<HeadsetMode>>,
    config: Option<Config>,
    joystick_mode: bool,
    driver_state: Option<DriverState>,
    dont_show_again: Vec<String>,
    installation: InstallationStatus,
    banner: BannerSlot,
    pending: Option<PendingConfirmation<GatedAction>>,
    tutorial_modal: Option<ModalHandle>,
    enrollment: Option<Enrollment>,
    enrollment_modal: Option<ModalHandle>,
    /// Supporter-tier details captured when a license refresh started.
    refresh_baseline: Option<SupporterTierDetails>,
    torn_down: bool,
    polls: u64,
}

impl std::fmt::Debug for PanelModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelModel")
            .field("installation", &self.installation)
            .field("config", &self.config)
            .field("driver_state", &self.driver_state)
            .field("reconciler", &self.reconciler)
            .field("torn_down", &self.torn_down)
            .field("polls", &self.polls)
            .finish_non_exhaustive()
    }
}

impl PanelModel {
    pub fn new(
        backend: Arc<dyn Backend>,
        shell: Arc<dyn HostShell>,
        clock: Arc<dyn Clock>,
        settings: PanelSettings,
    ) -> Self {
        let gate = GuidedActionGate::new(TutorialRegistry::standard(settings.vulkan_only));
        Self::with_gate(backend, shell, clock, settings, gate)
    }

    /// Use a custom tutorial gate.
    pub fn with_gate(
        backend: Arc<dyn Backend>,
        shell: Arc<dyn HostShell>,
        clock: Arc<dyn Clock>,
        settings: PanelSettings,
        gate: GuidedActionGate,
    ) -> Self {
        let reconciler = ControlReconciler::new(ReconcilerConfig {
            expire_window: settings.dirty_expire,
        });
        let headset_mode = StableValue::new(
            None,
            StabilizerConfig::with_delay(settings.headset_mode_delay),
        );
        Self {
            backend,
            shell,
            clock,
            settings,
            gate,
            reconciler,
            headset_mode,
            config: None,
            joystick_mode: false,
            driver_state: None,
            dont_show_again: Vec::new(),
            installation: InstallationStatus::default(),
            banner: BannerSlot::default(),
            pending: None,
            tutorial_modal: None,
            enrollment: None,
            enrollment_modal: None,
            refresh_baseline: None,
            torn_down: false,
            polls: 0,
        }
    }

    // --- accessors ---

    #[must_use]
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn driver_state(&self) -> Option<&DriverState> {
        self.driver_state.as_ref()
    }

    #[must_use]
    pub fn reconciler(&self) -> &ControlReconciler {
        &self.reconciler
    }

    #[must_use]
    pub fn dont_show_again_keys(&self) -> &[String] {
        &self.dont_show_again
    }

    #[must_use]
    pub fn enrollment(&self) -> Option<&Enrollment> {
        self.enrollment.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    /// Completed driver-state polls.
    #[must_use]
    pub fn polls(&self) -> u64 {
        self.polls
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // --- derived state ---

    fn license_now(&self) -> f64 {
        self.clock.epoch_secs()
    }

    fn supporter_details(&self) -> SupporterTierDetails {
        let license = self
            .driver_state
            .as_ref()
            .and_then(|s| s.device_license.as_ref());
        supporter_tier_details(license, self.license_now())
    }

    fn feature_enabled(&self, name: &str) -> bool {
        let license = self
            .driver_state
            .as_ref()
            .and_then(|s| s.device_license.as_ref());
        feature_enabled(license, name, self.license_now())
    }

    /// Pending slider value, else the mode the config represents.
    #[must_use]
    pub fn displayed_headset_mode(&self) -> HeadsetMode {
        (*self.headset_mode.dirty()).unwrap_or_else(|| HeadsetMode::from_config(self.config.as_ref()))
    }

    fn calibrating(&self) -> bool {
        self.reconciler.calibrating(self.driver_state.as_ref())
    }

    fn recenter_enabled(&self) -> bool {
        let recentering = self
            .reconciler
            .dirty()
            .is_some_and(|d| d.flags.recenter_screen == Some(true));
        !self.calibrating() && !recentering
    }

    // --- backend calls ---

    fn write_config(&mut self, edit: ConfigEdit) -> Cmd<PanelMsg> {
        let Some(current) = self.config.as_ref() else {
            warn!(?edit, "config edit before config loaded, ignoring");
            return Cmd::none();
        };
        let next = edit.apply(current);
        self.config = Some(next.clone());
        let backend = Arc::clone(&self.backend);
        Cmd::task_named("write_config", move || {
            PanelMsg::ConfigWritten(backend.write_config(&next))
        })
    }

    fn fetch_config(&self, reply: fn(BackendResult<Config>) -> PanelMsg) -> Cmd<PanelMsg> {
        let backend = Arc::clone(&self.backend);
        Cmd::task_named("retrieve_config", move || reply(backend.retrieve_config()))
    }

    fn write_control_flags(&self, flags: ControlFlags) -> Cmd<PanelMsg> {
        let backend = Arc::clone(&self.backend);
        Cmd::task_named("write_control_flags", move || {
            let result = backend.write_control_flags(&flags);
            PanelMsg::ControlFlagsWritten { flags, result }
        })
    }

    fn fetch_driver_state(&self) -> Cmd<PanelMsg> {
        let backend = Arc::clone(&self.backend);
        Cmd::task_named("retrieve_driver_state", move || {
            PanelMsg::DriverStateLoaded(backend.retrieve_driver_state())
        })
    }

    // --- actions ---

    fn gate_action(&mut self, action_key: &str, action: GatedAction) -> Cmd<PanelMsg> {
        let decision = self.gate.gate(
            action_key,
            action,
            &self.dont_show_again,
            self.driver_state.as_ref(),
        );
        self.supersede_pending();
        match decision {
            GateDecision::Proceed(action) => self.perform(action),
            GateDecision::Confirm(pending) => {
                let modal = self
                    .shell
                    .show_modal(ModalRequest::Tutorial(pending.prompt.clone()));
                self.tutorial_modal = Some(modal);
                self.pending = Some(pending);
                Cmd::none()
            }
        }
    }

    fn perform(&mut self, action: GatedAction) -> Cmd<PanelMsg> {
        match action {
            GatedAction::SetHeadsetMode(mode) => {
                info!(mode = mode.as_str(), "applying headset mode");
                let cmd = self.write_config(ConfigEdit::HeadsetMode {
                    mode,
                    joystick: self.joystick_mode,
                });
                if *self.headset_mode.dirty() == Some(mode) {
                    self.headset_mode.reset(None);
                }
                cmd
            }
            GatedAction::SetSbsEnabled(enabled) => {
                self.write_control_flags(ControlFlags::sbs_mode(enabled))
            }
        }
    }

    /// Drop an unanswered tutorial; a newer decision replaces its action.
    fn supersede_pending(&mut self) {
        if let Some(previous) = self.pending.take() {
            debug!(tutorial = %previous.prompt.key, "tutorial superseded");
            self.abandon(previous.action);
        }
        if let Some(mut modal) = self.tutorial_modal.take() {
            modal.close();
        }
    }

    /// A gated action was cancelled.
    fn abandon(&mut self, action: GatedAction) {
        if let GatedAction::SetHeadsetMode(mode) = action {
            if *self.headset_mode.dirty() == Some(mode) {
                self.headset_mode.reset(None);
            }
        }
    }

    fn on_headset_mode_settle(&mut self, token: SettleToken) -> Cmd<PanelMsg> {
        let now = self.clock.now();
        let Some(&Some(mode)) = self.headset_mode.settle(token, now) else {
            return Cmd::none();
        };
        if self.config.is_none() {
            debug!(mode = mode.as_str(), "no config yet, headset mode not applied");
            self.headset_mode.reset(None);
            return Cmd::none();
        }
        if mode == HeadsetMode::from_config(self.config.as_ref()) {
            self.headset_mode.reset(None);
            return Cmd::none();
        }
        let key = format!("headset_mode_{}", mode.as_str());
        self.gate_action(&key, GatedAction::SetHeadsetMode(mode))
    }

    fn on_sbs_toggle(&mut self, enabled: bool) -> Cmd<PanelMsg> {
        if !self.driver_state.as_ref().is_some_and(|s| s.sbs_mode_supported) {
            debug!(enabled, "side-by-side unsupported, toggle ignored");
            return Cmd::none();
        }
        if enabled && !self.feature_enabled(SBS_FEATURE) {
            return self.open_enrollment();
        }
        let key = format!("sbs_mode_enabled_{enabled}");
        self.gate_action(&key, GatedAction::SetSbsEnabled(enabled))
    }

    fn on_tutorial_answered(&mut self, outcome: DialogOutcome) -> Cmd<PanelMsg> {
        let Some(pending) = self.pending.take() else {
            trace!(?outcome, "tutorial answer without pending action");
            return Cmd::none();
        };
        if let Some(mut modal) = self.tutorial_modal.take() {
            modal.close();
        }
        let action = pending.action;
        let resolution = pending.resolve(outcome);

        let mut cmds = Vec::new();
        if let Some(key) = resolution.persist_key {
            let backend = Arc::clone(&self.backend);
            cmds.push(Cmd::task_named("set_dont_show_again", move || {
                let result = backend.set_dont_show_again(&key);
                PanelMsg::DontShowAgainSaved { key, result }
            }));
        }
        match resolution.action {
            Some(action) => cmds.push(self.perform(action)),
            None => self.abandon(action),
        }
        Cmd::batch(cmds)
    }

    // --- supporter tier ---

    fn open_enrollment(&mut self) -> Cmd<PanelMsg> {
        if self.enrollment.is_some() {
            trace!("enrollment already open");
            return Cmd::none();
        }
        self.enrollment = Some(Enrollment::new(&self.supporter_details()));
        self.enrollment_modal = Some(self.shell.show_modal(ModalRequest::SupporterTier));
        Cmd::none()
    }

    fn close_enrollment(&mut self) {
        self.enrollment = None;
        if let Some(mut modal) = self.enrollment_modal.take() {
            modal.close();
        }
    }

    fn feed_enrollment(&mut self, event: EnrollmentEvent) -> Cmd<PanelMsg> {
        let Some(enrollment) = self.enrollment.as_mut() else {
            trace!("enrollment event with no modal open");
            return Cmd::none();
        };
        let effects = enrollment.handle(event);
        let cmds = effects
            .into_iter()
            .map(|effect| self.run_effect(effect))
            .collect();
        Cmd::batch(cmds)
    }

    fn run_effect(&mut self, effect: EnrollmentEffect) -> Cmd<PanelMsg> {
        match effect {
            EnrollmentEffect::RefreshLicense => self.start_license_refresh(),
            EnrollmentEffect::VerifyToken(token) => {
                let backend = Arc::clone(&self.backend);
                Cmd::task_named("verify_token", move || {
                    PanelMsg::Enrollment(EnrollmentEvent::TokenVerified(
                        backend.verify_token(&token),
                    ))
                })
            }
            EnrollmentEffect::RequestToken(email) => {
                let backend = Arc::clone(&self.backend);
                Cmd::task_named("request_token", move || {
                    PanelMsg::Enrollment(EnrollmentEvent::TokenRequested(
                        backend.request_token(&email),
                    ))
                })
            }
            EnrollmentEffect::ScheduleClose => Cmd::after(
                self.settings.verify_success_close,
                PanelMsg::Enrollment(EnrollmentEvent::AutoCloseElapsed),
            ),
            EnrollmentEffect::Close => {
                self.close_enrollment();
                Cmd::none()
            }
            EnrollmentEffect::NavigateExternal(url) => {
                self.shell.navigate_external(&url);
                Cmd::none()
            }
        }
    }

    fn start_license_refresh(&mut self) -> Cmd<PanelMsg> {
        self.refresh_baseline = Some(self.supporter_details());
        let backend = Arc::clone(&self.backend);
        Cmd::task_named("refresh_device_license", move || {
            PanelMsg::LicenseRefreshRequested(
                backend.write_control_flags(&ControlFlags::refresh_device_license()),
            )
        })
    }

    fn on_license_refreshed(&mut self, result: BackendResult<DriverState>) -> Cmd<PanelMsg> {
        let baseline = self.refresh_baseline.take().unwrap_or_default();
        match result {
            Ok(state) => {
                self.reconciler.reconcile(&state, self.clock.now());
                let after = supporter_tier_details(state.device_license.as_ref(), self.license_now());
                self.driver_state = Some(state);
                self.banner.clear_for(Resource::License);
                let response = RefreshLicenseResponse::between(&baseline, after);
                info!(renewed = response.is_renewed, "license refreshed");
                self.feed_enrollment(EnrollmentEvent::LicenseRefreshed(Ok(response)))
            }
            Err(e) => {
                self.banner.fail(Resource::License, &e);
                self.feed_enrollment(EnrollmentEvent::LicenseRefreshed(Err(e)))
            }
        }
    }

    // --- teardown ---

    fn teardown(&mut self) -> Cmd<PanelMsg> {
        info!(polls = self.polls, "panel torn down");
        self.torn_down = true;
        self.headset_mode.cancel();
        self.pending = None;
        if let Some(mut modal) = self.tutorial_modal.take() {
            modal.close();
        }
        self.close_enrollment();
        Cmd::quit()
    }
}

impl Model for PanelModel {
    type Message = PanelMsg;
    type View = PanelView;

    fn init(&mut self) -> Cmd<PanelMsg> {
        info!(
            component = self.settings.component.as_str(),
            poll_ms = self.settings.poll_interval.as_millis() as u64,
            "panel starting"
        );
        let backend = Arc::clone(&self.backend);
        let component = self.settings.component;
        let install_check = Cmd::task_named("install_check", move || {
            PanelMsg::InstallChecked(backend.is_installed_and_running(component))
        });
        let backend = Arc::clone(&self.backend);
        let keys = Cmd::task_named("retrieve_dont_show_again_keys", move || {
            PanelMsg::DontShowAgainLoaded(backend.retrieve_dont_show_again_keys())
        });

        Cmd::batch(vec![
            self.fetch_config(PanelMsg::ConfigLoaded),
            self.write_control_flags(ControlFlags::request_features(
                self.settings.supporter_features.iter().cloned(),
            )),
            install_check,
            keys,
            Cmd::msg(PanelMsg::Poll),
        ])
    }

    fn update(&mut self, msg: PanelMsg) -> Cmd<PanelMsg> {
        if self.torn_down {
            trace!(?msg, "message after teardown dropped");
            return Cmd::none();
        }

        match msg {
            PanelMsg::Poll => self.fetch_driver_state(),
            PanelMsg::DriverStateLoaded(result) => {
                self.polls += 1;
                match result {
                    Ok(state) => {
                        if let Some(reason) = self.reconciler.reconcile(&state, self.clock.now()) {
                            trace!(reason = reason.as_str(), "dirty flags settled on poll");
                        }
                        self.driver_state = Some(state);
                        self.banner.clear_for(Resource::DriverState);
                    }
                    Err(e) => self.banner.fail(Resource::DriverState, &e),
                }
                Cmd::after(self.settings.poll_interval, PanelMsg::Poll)
            }

            PanelMsg::ConfigLoaded(result) => {
                match result {
                    Ok(config) => {
                        if self.config.is_none() {
                            self.joystick_mode = config.is_joystick_mode();
                        }
                        self.config = Some(config);
                        self.banner.clear_for(Resource::Config);
                    }
                    Err(e) => self.banner.fail(Resource::Config, &e),
                }
                Cmd::none()
            }
            PanelMsg::ConfigWritten(result) => match result {
                // The local config already holds the edit; the echo may be
                // older than a newer edit still in flight.
                Ok(_) => {
                    self.banner.clear_for(Resource::Config);
                    Cmd::none()
                }
                Err(e) => {
                    self.banner.fail(Resource::Config, &e);
                    self.fetch_config(PanelMsg::ConfigRestored)
                }
            },
            // The banner stays up: the write itself has not succeeded.
            PanelMsg::ConfigRestored(result) => {
                match result {
                    Ok(config) => self.config = Some(config),
                    Err(e) => self.banner.fail(Resource::Config, &e),
                }
                Cmd::none()
            }
            PanelMsg::ControlFlagsWritten { flags, result } => {
                match result {
                    Ok(()) => {
                        debug!(?flags, "control flags written");
                        self.reconciler.issue(flags, self.clock.now());
                        self.banner.clear_for(Resource::ControlFlags);
                    }
                    Err(e) => self.banner.fail(Resource::ControlFlags, &e),
                }
                Cmd::none()
            }
            PanelMsg::DontShowAgainLoaded(result) => {
                match result {
                    Ok(keys) => {
                        self.dont_show_again = keys;
                        self.banner.clear_for(Resource::DontShowAgain);
                    }
                    Err(e) => self.banner.fail(Resource::DontShowAgain, &e),
                }
                Cmd::none()
            }
            PanelMsg::DontShowAgainSaved { key, result } => {
                match result {
                    Ok(()) => {
                        if !self.dont_show_again.contains(&key) {
                            self.dont_show_again.push(key);
                        }
                        self.banner.clear_for(Resource::DontShowAgain);
                    }
                    Err(e) => self.banner.fail(Resource::DontShowAgain, &e),
                }
                Cmd::none()
            }
            PanelMsg::TutorialsReset(result) => {
                match result {
                    Ok(()) => {
                        self.dont_show_again.clear();
                        self.banner.clear_for(Resource::DontShowAgain);
                    }
                    Err(e) => self.banner.fail(Resource::DontShowAgain, &e),
                }
                Cmd::none()
            }
            PanelMsg::InstallChecked(result) => match result {
                Ok(true) => {
                    self.installation = InstallationStatus::Installed;
                    Cmd::none()
                }
                Ok(false) => {
                    info!(component = self.settings.component.as_str(), "installing");
                    self.installation = InstallationStatus::InProgress;
                    let backend = Arc::clone(&self.backend);
                    let component = self.settings.component;
                    Cmd::task_named("install", move || {
                        PanelMsg::InstallFinished(backend.install(component))
                    })
                }
                Err(e) => {
                    self.banner.fail(Resource::Installation, &e);
                    Cmd::none()
                }
            },
            PanelMsg::InstallFinished(result) => {
                if let Ok(true) = result {
                    info!("installation complete");
                    self.installation = InstallationStatus::Installed;
                } else {
                    self.installation = InstallationStatus::Failed;
                    self.banner.raise(ErrorBanner::install_failed());
                }
                Cmd::none()
            }

            PanelMsg::EditConfig(edit) => self.write_config(edit),
            PanelMsg::SetDisplayZoom(zoom) => {
                let edit = if self.reconciler.displayed_sbs_enabled(self.driver_state.as_ref()) {
                    ConfigEdit::SbsDisplaySize(zoom)
                } else {
                    ConfigEdit::DisplayZoom(zoom)
                };
                self.write_config(edit)
            }
            PanelMsg::SelectHeadsetMode(mode) => {
                let token = self.headset_mode.set(Some(mode), self.clock.now());
                Cmd::after(
                    self.headset_mode.delay(),
                    PanelMsg::HeadsetModeSettle(token),
                )
            }
            PanelMsg::HeadsetModeSettle(token) => self.on_headset_mode_settle(token),
            PanelMsg::SetJoystickMode(joystick) => {
                self.joystick_mode = joystick;
                let mode = HeadsetMode::from_config(self.config.as_ref());
                self.write_config(ConfigEdit::HeadsetMode { mode, joystick })
            }
            PanelMsg::SetSbsEnabled(enabled) => self.on_sbs_toggle(enabled),
            PanelMsg::SetSmoothFollow(enabled) => {
                if enabled && !self.feature_enabled(SMOOTH_FOLLOW_FEATURE) {
                    return self.open_enrollment();
                }
                self.write_config(ConfigEdit::SmoothFollow(enabled))
            }
            PanelMsg::Recenter => {
                if !self.recenter_enabled() {
                    trace!("recenter unavailable");
                    return Cmd::none();
                }
                self.write_control_flags(ControlFlags::recenter())
            }
            PanelMsg::Recalibrate => {
                if self.calibrating() {
                    trace!("already calibrating");
                    return Cmd::none();
                }
                self.write_control_flags(ControlFlags::recalibrate())
            }
            PanelMsg::ResetTutorials => {
                let backend = Arc::clone(&self.backend);
                Cmd::task_named("reset_dont_show_again", move || {
                    PanelMsg::TutorialsReset(backend.reset_dont_show_again())
                })
            }
            PanelMsg::TutorialAnswered(outcome) => self.on_tutorial_answered(outcome),
            PanelMsg::OpenSupporterTier => self.open_enrollment(),
            PanelMsg::Enrollment(event) => self.feed_enrollment(event),

            PanelMsg::LicenseRefreshRequested(result) => match result {
                Ok(()) => {
                    self.reconciler
                        .issue(ControlFlags::refresh_device_license(), self.clock.now());
                    Cmd::after(self.settings.license_settle, PanelMsg::LicenseRefreshSettled)
                }
                Err(e) => {
                    self.refresh_baseline = None;
                    self.banner.fail(Resource::License, &e);
                    self.feed_enrollment(EnrollmentEvent::LicenseRefreshed(Err(e)))
                }
            },
            PanelMsg::LicenseRefreshSettled => {
                let backend = Arc::clone(&self.backend);
                Cmd::task_named("retrieve_driver_state", move || {
                    PanelMsg::LicenseRefreshed(backend.retrieve_driver_state())
                })
            }
            PanelMsg::LicenseRefreshed(result) => self.on_license_refreshed(result),

            PanelMsg::Teardown => self.teardown(),
        }
    }

    fn view(&self) -> PanelView {
        let state = self.driver_state.as_ref();
        let headset_mode = self.displayed_headset_mode();
        let device_connected = state.is_some_and(DriverState::device_connected);
        let sbs_enabled = self.reconciler.displayed_sbs_enabled(state);
        let calibrating = self.calibrating();
        let recenter_enabled = self.recenter_enabled();
        let license = state.and_then(|s| s.device_license.as_ref());

        let sbs_description = if state.is_some_and(DriverState::sbs_firmware_update_needed) {
            Some(SBS_FIRMWARE_DESCRIPTION)
        } else if !state.is_some_and(|s| s.sbs_mode_enabled) {
            Some(SBS_DESCRIPTION)
        } else {
            None
        };

        PanelView {
            banner: self.banner.current().cloned(),
            installation: self.installation,
            ready: self.installation == InstallationStatus::Installed
                && self.config.is_some()
                && state.is_some(),
            device_name: state.map_or_else(
                || DriverState::default().device_name(),
                DriverState::device_name,
            ),
            device_connected,
            headset_mode,
            headset_mode_description: headset_mode.description(),
            controls_enabled: device_connected && headset_mode != HeadsetMode::Disabled,
            joystick_mode: self.joystick_mode,
            sbs_enabled,
            sbs_supported: state.is_some_and(|s| s.sbs_mode_supported),
            sbs_description,
            calibrating,
            recalibrate_description: (!calibrating).then_some(RECALIBRATE_DESCRIPTION),
            recenter_enabled,
            recenter_description: recenter_enabled.then_some(RECENTER_DESCRIPTION),
            show_reset_tutorials: headset_mode == HeadsetMode::VirtualDisplay
                && !self.dont_show_again.is_empty(),
            supporter_status: SupporterTierStatus::from_details(&self.supporter_details()),
            features: feature_labels(
                license,
                &self.settings.supporter_features,
                self.license_now(),
            ),
            config: self.config.clone(),
            enrollment: self.enrollment.as_ref().map(|e| e.view().clone()),
            tutorial: self.pending.as_ref().map(|p| p.prompt.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Component};
    use std::sync::Mutex;
    use std::time::Duration;
    use xrp_core::config::OutputMode;
    use xrp_runtime::{ManualClock, ProgramSimulator};

    /// Answers everything successfully with fixed values.
    #[derive(Default)]
    struct Healthy {
        state: Mutex<DriverState>,
        config_writes: Mutex<Vec<Config>>,
        flag_writes: Mutex<Vec<ControlFlags>>,
        fail_config_writes: bool,
    }

    impl Backend for Healthy {
        fn retrieve_config(&self) -> BackendResult<Config> {
            Ok(Config::default())
        }
        fn write_config(&self, config: &Config) -> BackendResult<Config> {
            self.config_writes.lock().unwrap().push(config.clone());
            if self.fail_config_writes {
                return Err(BackendError::Backend("disk full".into()));
            }
            Ok(config.clone())
        }
        fn retrieve_driver_state(&self) -> BackendResult<DriverState> {
            Ok(self.state.lock().unwrap().clone())
        }
        fn write_control_flags(&self, flags: &ControlFlags) -> BackendResult<()> {
            self.flag_writes.lock().unwrap().push(flags.clone());
            Ok(())
        }
        fn retrieve_dont_show_again_keys(&self) -> BackendResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn set_dont_show_again(&self, _key: &str) -> BackendResult<()> {
            Ok(())
        }
        fn reset_dont_show_again(&self) -> BackendResult<()> {
            Ok(())
        }
        fn request_token(&self, _email: &str) -> BackendResult<bool> {
            Ok(true)
        }
        fn verify_token(&self, _token: &str) -> BackendResult<bool> {
            Ok(true)
        }
        fn is_installed_and_running(&self, _component: Component) -> BackendResult<bool> {
            Ok(true)
        }
        fn install(&self, _component: Component) -> BackendResult<bool> {
            Ok(true)
        }
    }

    struct NoShell;

    impl HostShell for NoShell {
        fn show_modal(&self, _request: ModalRequest) -> ModalHandle {
            ModalHandle::detached(0)
        }
        fn navigate_external(&self, _url: &str) {}
    }

    fn sim(backend: Arc<Healthy>) -> ProgramSimulator<PanelModel> {
        let clock = ManualClock::new(1_700_000_000.0);
        let model = PanelModel::new(
            backend,
            Arc::new(NoShell),
            Arc::new(clock.clone()),
            PanelSettings::default().with_vulkan_only(false),
        );
        let mut sim = ProgramSimulator::with_clock(model, clock);
        sim.init();
        sim
    }

    #[test]
    fn init_loads_everything_and_polls() {
        let sim = sim(Arc::new(Healthy::default()));
        let view = sim.view();
        assert!(view.ready);
        assert_eq!(view.installation, InstallationStatus::Installed);
        assert_eq!(view.device_name, "No device connected");
        assert_eq!(sim.model().polls(), 1);
        assert_eq!(sim.pending_timers(), 1);
    }

    #[test]
    fn poll_reschedules_after_each_result() {
        let mut sim = sim(Arc::new(Healthy::default()));
        sim.advance(Duration::from_millis(3500));
        assert_eq!(sim.model().polls(), 4);
    }

    #[test]
    fn failed_config_write_refetches() {
        let backend = Arc::new(Healthy {
            fail_config_writes: true,
            ..Healthy::default()
        });
        let mut sim = sim(Arc::clone(&backend));
        sim.send(PanelMsg::EditConfig(ConfigEdit::LookAhead(12)));

        let view = sim.view();
        assert_eq!(view.banner.map(|b| b.resource), Some(Resource::Config));
        // Re-fetched authoritative config replaced the optimistic edit.
        assert_eq!(view.config, Some(Config::default()));
    }

    #[test]
    fn joystick_toggle_rewrites_vr_lite_config() {
        let backend = Arc::new(Healthy::default());
        let mut sim = sim(Arc::clone(&backend));
        sim.send(PanelMsg::SelectHeadsetMode(HeadsetMode::VrLite));
        sim.advance(Duration::from_secs(1));
        sim.send(PanelMsg::SetJoystickMode(true));

        let writes = backend.config_writes.lock().unwrap();
        assert_eq!(writes.last().map(|c| c.output_mode), Some(OutputMode::Joystick));
        assert!(sim.view().joystick_mode);
    }

    #[test]
    fn recenter_disabled_while_dirty() {
        let backend = Arc::new(Healthy::default());
        let mut sim = sim(Arc::clone(&backend));
        sim.send(PanelMsg::Recenter);
        assert!(!sim.view().recenter_enabled);
        assert_eq!(sim.view().recenter_description, None);

        sim.send(PanelMsg::Recenter);
        let recenters = backend
            .flag_writes
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.recenter_screen == Some(true))
            .count();
        assert_eq!(recenters, 1);

        // Recenter has no echo; it clears by expiry.
        sim.advance(Duration::from_millis(4000));
        assert!(sim.view().recenter_enabled);
    }

    #[test]
    fn teardown_stops_everything() {
        let mut sim = sim(Arc::new(Healthy::default()));
        sim.send(PanelMsg::SelectHeadsetMode(HeadsetMode::Sideview));
        sim.send(PanelMsg::Teardown);
        assert!(!sim.is_running());
        assert!(sim.model().is_torn_down());

        let polls = sim.model().polls();
        let _ = sim.model_mut().update(PanelMsg::Poll);
        assert_eq!(sim.model().polls(), polls);
    }
}
