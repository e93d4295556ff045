//! Side-by-side toggling through the tutorial gate and the dirty-flag overlay.

use std::time::Duration;

use xrp_core::driver_state::{DriverState, SbsModeControl};
use xrp_harness::{PanelFixture, ScriptedBackend, fixtures};
use xrp_panel::gate::{DialogOutcome, TutorialContent};
use xrp_panel::panel::PanelMsg;
use xrp_panel::shell::ModalRequest;

fn supporter_with_glasses() -> ScriptedBackend {
    ScriptedBackend::new().with_driver_state(DriverState {
        device_license: Some(fixtures::supporter_license(None)),
        ..fixtures::connected("VITURE", "Pro")
    })
}

fn enable_sbs_through_tutorial(panel: &mut PanelFixture, outcome: DialogOutcome) {
    panel.send(PanelMsg::SetSbsEnabled(true));
    let prompt = panel.view().tutorial.expect("tutorial shown");
    assert_eq!(prompt.key, "sbs_mode_enabled_true");
    assert_eq!(prompt.content, TutorialContent::SideBySide { vulkan_only: false });
    assert_eq!(
        prompt.sbs_instructions(),
        Some("long-pressing the mode (short) button for about 2 seconds")
    );
    panel.send(PanelMsg::TutorialAnswered(outcome));
}

#[test]
fn intended_value_shows_until_driver_confirms() {
    let mut panel = PanelFixture::start(supporter_with_glasses());
    assert!(!panel.view().sbs_enabled);

    enable_sbs_through_tutorial(&mut panel, DialogOutcome::Ok);

    let last = panel.backend.flag_writes().pop().unwrap();
    assert_eq!(last.sbs_mode, Some(SbsModeControl::Enable));
    // Driver has not caught up yet; the toggle shows the intent.
    assert!(panel.view().sbs_enabled);
    assert!(panel.model().reconciler().is_dirty());

    panel.backend.update_driver_state(|s| s.sbs_mode_enabled = true);
    panel.sim.advance(Duration::from_secs(1));

    assert!(!panel.model().reconciler().is_dirty());
    assert_eq!(panel.model().reconciler().stats().confirmed, 1);
    assert!(panel.view().sbs_enabled);
}

#[test]
fn unconfirmed_intent_expires_and_snaps_back() {
    let mut panel = PanelFixture::start(supporter_with_glasses());
    enable_sbs_through_tutorial(&mut panel, DialogOutcome::Ok);

    // Exactly at the window the intent still holds.
    panel.sim.advance(Duration::from_millis(3000));
    assert!(panel.view().sbs_enabled);

    panel.sim.advance(Duration::from_millis(1000));
    assert!(!panel.view().sbs_enabled);
    assert_eq!(panel.model().reconciler().stats().expired, 1);
    assert_eq!(panel.model().reconciler().stats().confirmed, 0);
}

#[test]
fn dont_show_again_skips_future_tutorials() {
    let mut panel = PanelFixture::start(supporter_with_glasses());
    enable_sbs_through_tutorial(&mut panel, DialogOutcome::DontShowAgain);

    assert_eq!(panel.backend.dont_show_again(), vec!["sbs_mode_enabled_true"]);
    assert_eq!(
        panel.model().dont_show_again_keys(),
        ["sbs_mode_enabled_true".to_string()]
    );

    panel.send(PanelMsg::SetSbsEnabled(false));
    panel.send(PanelMsg::SetSbsEnabled(true));

    let tutorials = panel
        .shell
        .shown()
        .into_iter()
        .filter(|r| matches!(r, ModalRequest::Tutorial(_)))
        .count();
    assert_eq!(tutorials, 1);
    assert!(panel.shell.open_modals().is_empty());
    assert_eq!(
        panel.backend.flag_writes().last().and_then(|f| f.sbs_mode),
        Some(SbsModeControl::Enable)
    );
}

#[test]
fn cancelled_tutorial_writes_nothing() {
    let mut panel = PanelFixture::start(supporter_with_glasses());
    let before = panel.backend.flag_writes().len();

    enable_sbs_through_tutorial(&mut panel, DialogOutcome::Cancel);

    assert_eq!(panel.backend.flag_writes().len(), before);
    assert!(!panel.view().sbs_enabled);
    assert!(panel.view().tutorial.is_none());
    assert!(panel.shell.open_modals().is_empty());
}

#[test]
fn unsupported_glasses_ignore_toggle() {
    let mut panel = PanelFixture::start(ScriptedBackend::new().with_driver_state(DriverState {
        sbs_mode_supported: false,
        firmware_update_recommended: true,
        device_license: Some(fixtures::supporter_license(None)),
        ..fixtures::connected("XREAL", "Air")
    }));
    panel.send(PanelMsg::SetSbsEnabled(true));

    let view = panel.view();
    assert!(view.tutorial.is_none());
    assert!(!view.sbs_supported);
    assert_eq!(
        view.sbs_description,
        Some("Update your glasses' firmware to enable side-by-side mode.")
    );
}

#[test]
fn recalibrate_shows_calibrating_until_driver_reports_it() {
    let mut panel = PanelFixture::start(ScriptedBackend::new().with_driver_state(
        fixtures::connected("XREAL", "One"),
    ));
    panel.send(PanelMsg::Recalibrate);

    let view = panel.view();
    assert!(view.calibrating);
    assert!(!view.recenter_enabled);
    assert_eq!(view.recalibrate_description, None);

    // A second press while calibrating is ignored.
    panel.send(PanelMsg::Recalibrate);
    let recalibrations = panel
        .backend
        .flag_writes()
        .iter()
        .filter(|f| f.recalibrate == Some(true))
        .count();
    assert_eq!(recalibrations, 1);

    panel.backend.update_driver_state(|s| {
        s.calibration_state = xrp_core::driver_state::CalibrationState::Calibrating;
    });
    panel.sim.advance(Duration::from_secs(1));
    assert_eq!(panel.model().reconciler().stats().confirmed, 1);
    assert!(panel.view().calibrating);

    panel.backend.update_driver_state(|s| {
        s.calibration_state = xrp_core::driver_state::CalibrationState::Calibrated;
    });
    panel.sim.advance(Duration::from_secs(1));
    assert!(!panel.view().calibrating);
    assert!(panel.view().recenter_enabled);
}

#[test]
fn failed_flag_write_leaves_display_alone() {
    let mut panel = PanelFixture::start(ScriptedBackend::new().with_driver_state(
        fixtures::connected("XREAL", "One"),
    ));
    panel.backend.fail_next(
        "write_control_flags",
        xrp_panel::BackendError::Backend("driver busy".into()),
    );
    panel.send(PanelMsg::Recenter);

    let view = panel.view();
    assert!(view.recenter_enabled);
    let banner = view.banner.expect("banner");
    assert_eq!(banner.resource, xrp_panel::Resource::ControlFlags);
    assert_eq!(banner.message, "driver busy");

    panel.send(PanelMsg::Recenter);
    assert!(panel.view().banner.is_none());
    assert!(!panel.view().recenter_enabled);
}
