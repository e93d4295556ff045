#![forbid(unsafe_code)]

//! Control-panel model for the XR driver.
//!
//! The panel talks to the driver agent through a [`Backend`], presents modals
//! through a [`HostShell`], and keeps all session state in [`PanelModel`],
//! which runs on the `xrp-runtime` event loop.

pub mod backend;
pub mod banner;
pub mod enrollment;
pub mod gate;
pub mod panel;
pub mod settings;
pub mod shell;
pub mod status;
pub mod wire;

pub use backend::{Backend, BackendError, BackendResult, Component};
pub use banner::{ErrorBanner, Resource};
pub use enrollment::{
    Enrollment, EnrollmentEffect, EnrollmentEvent, EnrollmentView, RefreshLicenseResponse,
};
pub use gate::{DialogOutcome, GateDecision, GuidedActionGate, TutorialPrompt, TutorialRegistry};
pub use panel::{GatedAction, InstallationStatus, PanelModel, PanelMsg, PanelView};
pub use settings::PanelSettings;
pub use shell::{HostShell, ModalHandle, ModalRequest};
pub use status::{FeatureLabel, SupporterTierStatus};
pub use wire::{PluginBackend, PluginTransport, ServerResponse};
