#![forbid(unsafe_code)]

//! Host shell capabilities: modal presentation and external navigation.
//!
//! Showing a modal returns a [`ModalHandle`], the only way to close it. The
//! panel threads the handle to whoever needs to close the modal instead of
//! keeping a shared close reference.

use std::fmt;

use crate::gate::TutorialPrompt;

/// Donation page opened from the enrollment modal.
pub const DONATION_URL: &str = "https://ko-fi.com/wheaney";

/// What the host is asked to present.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalRequest {
    /// A tutorial confirmation with OK / Don't show again / Cancel.
    Tutorial(TutorialPrompt),
    /// The supporter-tier enrollment modal. Its content follows the panel view.
    SupporterTier,
}

impl ModalRequest {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tutorial(_) => "tutorial",
            Self::SupporterTier => "supporter_tier",
        }
    }
}

/// Explicit close capability for one presented modal.
pub struct ModalHandle {
    id: u64,
    close: Option<Box<dyn FnOnce() + Send>>,
}

impl ModalHandle {
    /// Wrap the host's close callback.
    pub fn new(id: u64, close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            close: Some(Box::new(close)),
        }
    }

    /// A handle for a modal the host closes on its own.
    #[must_use]
    pub fn detached(id: u64) -> Self {
        Self { id, close: None }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Close the modal. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.close.take() {
            Some(close) => {
                close();
                true
            }
            None => false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.close.is_some()
    }
}

impl fmt::Debug for ModalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalHandle")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Presentation capabilities supplied by the host overlay.
pub trait HostShell: Send + Sync {
    fn show_modal(&self, request: ModalRequest) -> ModalHandle;

    fn navigate_external(&self, url: &str);
}
