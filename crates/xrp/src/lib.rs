#![forbid(unsafe_code)]

//! XR driver control panel facade.
//!
//! Re-exports the common types of the internal crates and offers a prelude
//! plus [`run_panel`], which drives a [`PanelModel`] on the threaded runtime
//! with the system clock.

use std::fmt;
use std::sync::Arc;

// --- Core re-exports -------------------------------------------------------

pub use xrp_core::config::{Config, ConfigEdit, HeadsetMode};
pub use xrp_core::driver_state::{ControlFlags, DriverState, SbsModeControl};
pub use xrp_core::entitlement::{FeatureDetails, SupporterTierDetails};
pub use xrp_core::license::{Feature, FeatureStatus, License, Tier};
pub use xrp_core::reconciler::{ClearReason, ControlReconciler};
pub use xrp_core::stabilizer::StableValue;

// --- Runtime re-exports ----------------------------------------------------

pub use xrp_runtime::{
    Clock, Cmd, ManualClock, Model, Program, ProgramConfig, ProgramHandle, SystemClock,
};

// --- Panel re-exports ------------------------------------------------------

pub use xrp_panel::{
    Backend, BackendError, BackendResult, Component, DialogOutcome, EnrollmentEvent,
    EnrollmentView, ErrorBanner, HostShell, ModalHandle, ModalRequest, PanelModel, PanelMsg,
    PanelSettings, PanelView, PluginBackend, PluginTransport, ServerResponse,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for panel hosts.
#[derive(Debug)]
pub enum Error {
    /// A backend call failed.
    Backend(BackendError),
    /// I/O failure in the runtime.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Standard result type for xrp APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Run the panel until it is torn down, returning the final model.
///
/// Settings come from the environment (see [`PanelSettings::from_env`]).
/// With the `tracing-json` feature a JSON subscriber is installed first,
/// unless the host already set one.
/// Hosts that deliver input should use [`build_panel`] and keep a
/// [`ProgramHandle`] from [`Program::handle`] before running.
pub fn run_panel(backend: Arc<dyn Backend>, shell: Arc<dyn HostShell>) -> Result<PanelModel> {
    #[cfg(feature = "tracing-json")]
    if !xrp_core::logging::init_json_subscriber() {
        tracing::debug!("global subscriber already set, keeping it");
    }
    let program = build_panel(backend, shell, PanelSettings::from_env());
    Ok(program.run()?)
}

/// Build a panel program on the system clock without starting it.
pub fn build_panel(
    backend: Arc<dyn Backend>,
    shell: Arc<dyn HostShell>,
    settings: PanelSettings,
) -> Program<PanelModel> {
    tracing::debug!(?settings, "building panel");
    let model = PanelModel::new(backend, shell, Arc::new(SystemClock), settings);
    Program::with_config(model, ProgramConfig::default().with_task_thread_name("xrp-panel-task"))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Backend, BackendError, Cmd, Config, DriverState, Error, HeadsetMode, HostShell, License,
        Model, PanelModel, PanelMsg, PanelSettings, PanelView, Program, Result,
    };

    pub use crate::{core, panel, runtime};
}

pub use xrp_core as core;
pub use xrp_panel as panel;
pub use xrp_runtime as runtime;
