#![forbid(unsafe_code)]

//! The panel's single error banner.
//!
//! Backend failures become user-visible text only here. A banner is tied to
//! the resource whose call failed and is cleared by the next successful call
//! for that resource. Installation failures are fatal for the session.

use std::fmt;

use serde::Serialize;
use tracing::{error, warn};

use crate::backend::BackendError;

/// Shown when installation fails.
pub const INSTALL_FAILED_MESSAGE: &str = "There was an error during setup. Try restarting your \
     Steam Deck. If the error persists, please file an issue in the decky-XRGaming GitHub repository.";

/// Which backend resource a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Config,
    DriverState,
    ControlFlags,
    DontShowAgain,
    Installation,
    License,
}

impl Resource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::DriverState => "driver_state",
            Self::ControlFlags => "control_flags",
            Self::DontShowAgain => "dont_show_again",
            Self::Installation => "installation",
            Self::License => "license",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBanner {
    pub resource: Resource,
    pub message: String,
    /// Survives later successes.
    pub fatal: bool,
}

impl ErrorBanner {
    /// Banner for a failed backend call.
    #[must_use]
    pub fn from_error(resource: Resource, err: &BackendError) -> Self {
        Self {
            resource,
            message: err.user_message(),
            fatal: false,
        }
    }

    /// The session-ending installation banner.
    #[must_use]
    pub fn install_failed() -> Self {
        Self {
            resource: Resource::Installation,
            message: INSTALL_FAILED_MESSAGE.to_string(),
            fatal: true,
        }
    }
}

/// Holds at most one banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannerSlot {
    current: Option<ErrorBanner>,
}

impl BannerSlot {
    /// Show `banner` unless a fatal one is already up.
    pub fn raise(&mut self, banner: ErrorBanner) {
        if self.current.as_ref().is_some_and(|b| b.fatal) {
            warn!(
                resource = %banner.resource,
                error = %banner.message,
                "error suppressed behind fatal banner"
            );
            return;
        }
        if banner.fatal {
            error!(resource = %banner.resource, error = %banner.message, "fatal error");
        } else {
            warn!(resource = %banner.resource, error = %banner.message, "backend call failed");
        }
        self.current = Some(banner);
    }

    /// Record a failed call for `resource`.
    pub fn fail(&mut self, resource: Resource, err: &BackendError) {
        self.raise(ErrorBanner::from_error(resource, err));
    }

    /// A call for `resource` succeeded.
    pub fn clear_for(&mut self, resource: Resource) {
        if self
            .current
            .as_ref()
            .is_some_and(|b| !b.fatal && b.resource == resource)
        {
            self.current = None;
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&ErrorBanner> {
        self.current.as_ref()
    }
}
