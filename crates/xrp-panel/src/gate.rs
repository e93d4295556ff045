#![forbid(unsafe_code)]

//! Guided-action gate.
//!
//! Some state-changing actions are preceded, the first time, by a tutorial
//! the user must acknowledge. [`GuidedActionGate::gate`] either lets the
//! action through immediately or parks it in a [`PendingConfirmation`] until
//! the dialog is answered.
//!
//! | Dialog outcome   | Action performed | Key persisted |
//! |------------------|------------------|---------------|
//! | OK               | yes              | no            |
//! | Don't show again | yes              | yes           |
//! | Cancel           | no               | no            |

use std::collections::BTreeMap;

use tracing::debug;
use xrp_core::driver_state::DriverState;

pub const OK_LABEL: &str = "OK";
pub const DONT_SHOW_AGAIN_LABEL: &str = "Don't show again";
pub const CANCEL_LABEL: &str = "Cancel";

/// Suffix of the tutorial variant used in Vulkan-only mode.
const VULKAN_ONLY_SUFFIX: &str = "_vulkan_only";

// ---------------------------------------------------------------------------
// Tutorials
// ---------------------------------------------------------------------------

/// Which tutorial body to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorialContent {
    /// Virtual-display limitations and performance tips.
    VirtualDisplay,
    /// Side-by-side usage and controls.
    SideBySide { vulkan_only: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tutorial {
    pub title: &'static str,
    pub content: TutorialContent,
}

/// How to toggle SBS from the glasses themselves, per brand.
#[must_use]
pub fn sbs_toggle_instructions(brand: &str) -> &'static str {
    match brand {
        "XREAL" => "long-pressing the brightness/volume-up button for about 3 seconds",
        "VITURE" => "long-pressing the mode (short) button for about 2 seconds",
        "TCL" => "long-pressing the brightness-up button on the right arm",
        "RayNeo" => "pressing the buttons on the left and right arms of the glasses simultaneously",
        "Rokid" => "long-pressing the brightness (short) button for about 2 seconds",
        _ => "consulting the owner's manual",
    }
}

/// Everything the host needs to render a tutorial dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorialPrompt {
    /// Resolved tutorial key; this is what "Don't show again" persists.
    pub key: String,
    pub title: String,
    pub content: TutorialContent,
    pub device_brand: String,
    pub device_model: String,
}

impl TutorialPrompt {
    /// Brand-specific SBS toggle hint for side-by-side tutorials.
    #[must_use]
    pub fn sbs_instructions(&self) -> Option<&'static str> {
        match self.content {
            TutorialContent::SideBySide { .. } => Some(sbs_toggle_instructions(&self.device_brand)),
            TutorialContent::VirtualDisplay => None,
        }
    }
}

/// Tutorials keyed by `<action>` or `<action>_vulkan_only`.
#[derive(Debug, Clone, Default)]
pub struct TutorialRegistry {
    tutorials: BTreeMap<String, Tutorial>,
    vulkan_only: bool,
}

impl TutorialRegistry {
    /// An empty registry: every action passes straight through.
    #[must_use]
    pub fn empty(vulkan_only: bool) -> Self {
        Self {
            tutorials: BTreeMap::new(),
            vulkan_only,
        }
    }

    /// The panel's built-in tutorials.
    #[must_use]
    pub fn standard(vulkan_only: bool) -> Self {
        Self::empty(vulkan_only)
            .with(
                "headset_mode_virtual_display_vulkan_only",
                Tutorial {
                    title: "Virtual Display",
                    content: TutorialContent::VirtualDisplay,
                },
            )
            .with(
                "sbs_mode_enabled_true_vulkan_only",
                Tutorial {
                    title: "Side-by-side mode",
                    content: TutorialContent::SideBySide { vulkan_only: true },
                },
            )
            .with(
                "sbs_mode_enabled_true",
                Tutorial {
                    title: "Side-by-side mode",
                    content: TutorialContent::SideBySide { vulkan_only: false },
                },
            )
    }

    /// Register a tutorial under `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, tutorial: Tutorial) -> Self {
        self.tutorials.insert(key.into(), tutorial);
        self
    }

    /// Find the tutorial for an action, preferring the Vulkan-only variant
    /// when that mode is on.
    #[must_use]
    pub fn resolve(&self, action_key: &str) -> Option<(String, &Tutorial)> {
        if self.vulkan_only {
            let variant = format!("{action_key}{VULKAN_ONLY_SUFFIX}");
            if let Some(tutorial) = self.tutorials.get(&variant) {
                return Some((variant, tutorial));
            }
        }
        self.tutorials
            .get(action_key)
            .map(|tutorial| (action_key.to_string(), tutorial))
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Answer to a tutorial dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogOutcome {
    Ok,
    DontShowAgain,
    Cancel,
}

/// What the gate decided for an action.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision<A> {
    /// Perform the action now.
    Proceed(A),
    /// Show the prompt and wait for an answer.
    Confirm(PendingConfirmation<A>),
}

/// An action parked behind a tutorial dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation<A> {
    pub prompt: TutorialPrompt,
    pub action: A,
}

/// What to do once the dialog has been answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<A> {
    /// The action to perform, if any.
    pub action: Option<A>,
    /// Key to add to the persisted don't-show-again set.
    pub persist_key: Option<String>,
}

impl<A> PendingConfirmation<A> {
    /// Apply the dialog outcome.
    pub fn resolve(self, outcome: DialogOutcome) -> Resolution<A> {
        debug!(tutorial = %self.prompt.key, ?outcome, "tutorial answered");
        match outcome {
            DialogOutcome::Ok => Resolution {
                action: Some(self.action),
                persist_key: None,
            },
            DialogOutcome::DontShowAgain => Resolution {
                action: Some(self.action),
                persist_key: Some(self.prompt.key),
            },
            DialogOutcome::Cancel => Resolution {
                action: None,
                persist_key: None,
            },
        }
    }
}

/// Wraps actions with one-time tutorial confirmation.
#[derive(Debug, Clone, Default)]
pub struct GuidedActionGate {
    registry: TutorialRegistry,
}

impl GuidedActionGate {
    #[must_use]
    pub fn new(registry: TutorialRegistry) -> Self {
        Self { registry }
    }

    /// Decide whether `action` needs a tutorial first.
    ///
    /// Actions with no registered tutorial, or whose key (or resolved tutorial
    /// key) is in `dont_show_again`, proceed immediately.
    pub fn gate<A>(
        &self,
        action_key: &str,
        action: A,
        dont_show_again: &[String],
        state: Option<&DriverState>,
    ) -> GateDecision<A> {
        let Some((key, tutorial)) = self.registry.resolve(action_key) else {
            debug!(action_key, "no tutorial registered, proceeding");
            return GateDecision::Proceed(action);
        };
        if dont_show_again
            .iter()
            .any(|k| k == action_key || *k == key)
        {
            debug!(action_key, tutorial = %key, "tutorial dismissed earlier, proceeding");
            return GateDecision::Proceed(action);
        }

        debug!(action_key, tutorial = %key, "tutorial confirmation required");
        GateDecision::Confirm(PendingConfirmation {
            prompt: TutorialPrompt {
                key,
                title: tutorial.title.to_string(),
                content: tutorial.content,
                device_brand: state
                    .and_then(|s| s.connected_device_brand.clone())
                    .unwrap_or_default(),
                device_model: state
                    .and_then(|s| s.connected_device_model.clone())
                    .unwrap_or_default(),
            },
            action,
        })
    }
}
