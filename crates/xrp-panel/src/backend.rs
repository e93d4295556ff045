#![forbid(unsafe_code)]

//! Request/response contract with the driver agent.
//!
//! Every call returns an explicit [`BackendResult`]; the panel converts
//! failures into an error banner in exactly one place.

use std::fmt;
use std::io;

use xrp_core::config::Config;
use xrp_core::driver_state::{ControlFlags, DriverState};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The call never reached the backend, or the reply was lost.
    Transport(String),
    /// The backend answered with a failure marker.
    Backend(String),
    /// The reply could not be decoded into the expected type.
    Decode(String),
}

impl BackendError {
    /// Text shown to the user in the error banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Backend(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(msg) => write!(f, "transport error: {msg}"),
            BackendError::Backend(msg) => write!(f, "backend error: {msg}"),
            BackendError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<io::Error> for BackendError {
    fn from(e: io::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Installable component managed by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Component {
    /// The head-tracking driver on its own.
    Driver,
    /// The Vulkan layer bundle that ships the driver.
    #[default]
    Breezy,
}

impl Component {
    /// Name used in agent method names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Breezy => "breezy",
        }
    }

    /// `is_<component>_installed_and_running`
    #[must_use]
    pub fn installed_method(self) -> String {
        format!("is_{}_installed_and_running", self.as_str())
    }

    /// `install_<component>`
    #[must_use]
    pub fn install_method(self) -> String {
        format!("install_{}", self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Driver agent operations used by the panel.
///
/// Implementations are called from worker threads, one call per task.
pub trait Backend: Send + Sync {
    fn retrieve_config(&self) -> BackendResult<Config>;

    /// Persist a complete config, returning what the agent stored.
    fn write_config(&self, config: &Config) -> BackendResult<Config>;

    fn retrieve_driver_state(&self) -> BackendResult<DriverState>;

    /// Write a partial set of control flags.
    fn write_control_flags(&self, flags: &ControlFlags) -> BackendResult<()>;

    fn retrieve_dont_show_again_keys(&self) -> BackendResult<Vec<String>>;

    fn set_dont_show_again(&self, key: &str) -> BackendResult<()>;

    fn reset_dont_show_again(&self) -> BackendResult<()>;

    /// Ask the license server to email a token. `Ok(false)` means refused.
    fn request_token(&self, email: &str) -> BackendResult<bool>;

    /// Check a token. `Ok(false)` means the token was rejected.
    fn verify_token(&self, token: &str) -> BackendResult<bool>;

    fn is_installed_and_running(&self, component: Component) -> BackendResult<bool>;

    fn install(&self, component: Component) -> BackendResult<bool>;
}
