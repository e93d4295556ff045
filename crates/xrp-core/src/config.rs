#![forbid(unsafe_code)]

//! Driver configuration model and its edit builders.
//!
//! The driver only ever accepts a complete [`Config`]. Instead of merging
//! partial objects, every edit goes through a `with_*` builder that takes the
//! current config and returns a new complete value with exactly one concern
//! changed. [`ConfigEdit`] is the message-level form of those builders.

use serde::{Deserialize, Serialize};

/// How head movements are fed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Mouse,
    Joystick,
    ExternalOnly,
}

/// Which external renderer consumes head tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalMode {
    VirtualDisplay,
    Sideview,
    #[default]
    None,
}

/// Anchor of the sideview screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideviewPosition {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl SideviewPosition {
    /// All positions in menu order.
    pub const ALL: [Self; 5] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
    ];

    /// Menu label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TopLeft => "Top left",
            Self::TopRight => "Top right",
            Self::BottomLeft => "Bottom left",
            Self::BottomRight => "Bottom right",
            Self::Center => "Center",
        }
    }
}

/// User-facing headset mode, derived from and mapped onto [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadsetMode {
    VirtualDisplay,
    VrLite,
    Sideview,
    Disabled,
}

impl HeadsetMode {
    /// All modes in slider order.
    pub const ALL: [Self; 4] = [
        Self::VirtualDisplay,
        Self::VrLite,
        Self::Sideview,
        Self::Disabled,
    ];

    /// Wire/tutorial-key name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VirtualDisplay => "virtual_display",
            Self::VrLite => "vr_lite",
            Self::Sideview => "sideview",
            Self::Disabled => "disabled",
        }
    }

    /// One-line description shown under the slider.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::VirtualDisplay => "Virtual display is only available in-game.",
            Self::VrLite => "Use Head movements to look around in-game.",
            Self::Sideview => "Move the screen to your peripheral.",
            Self::Disabled => "Static display with no head-tracking.",
        }
    }

    /// Derive the mode a config represents. A missing config is `Disabled`.
    #[must_use]
    pub fn from_config(config: Option<&Config>) -> Self {
        let Some(config) = config else {
            return Self::Disabled;
        };
        if config.disabled {
            return Self::Disabled;
        }
        match (config.output_mode, config.external_mode) {
            (OutputMode::ExternalOnly, ExternalMode::None) => Self::Disabled,
            (OutputMode::ExternalOnly, ExternalMode::VirtualDisplay) => Self::VirtualDisplay,
            (OutputMode::ExternalOnly, ExternalMode::Sideview) => Self::Sideview,
            _ => Self::VrLite,
        }
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub disabled: bool,
    pub output_mode: OutputMode,
    pub external_mode: ExternalMode,
    pub mouse_sensitivity: u32,
    pub display_zoom: f64,
    pub look_ahead: u32,
    pub sbs_display_size: f64,
    pub sbs_display_distance: f64,
    pub sbs_content: bool,
    pub sbs_mode_stretched: bool,
    pub sideview_position: SideviewPosition,
    pub sideview_display_size: f64,
    #[serde(default)]
    pub smooth_follow_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disabled: true,
            output_mode: OutputMode::ExternalOnly,
            external_mode: ExternalMode::None,
            mouse_sensitivity: 30,
            display_zoom: 1.0,
            look_ahead: 0,
            sbs_display_size: 1.0,
            sbs_display_distance: 1.0,
            sbs_content: false,
            sbs_mode_stretched: false,
            sideview_position: SideviewPosition::TopLeft,
            sideview_display_size: 1.0,
            smooth_follow_enabled: false,
        }
    }
}

impl Config {
    /// Switch to `mode`. `joystick` picks the output device for VR-Lite.
    #[must_use]
    pub fn with_headset_mode(&self, mode: HeadsetMode, joystick: bool) -> Self {
        let mut next = self.clone();
        match mode {
            HeadsetMode::VirtualDisplay => {
                next.disabled = false;
                next.output_mode = OutputMode::ExternalOnly;
                next.external_mode = ExternalMode::VirtualDisplay;
            }
            HeadsetMode::VrLite => {
                next.disabled = false;
                next.output_mode = if joystick {
                    OutputMode::Joystick
                } else {
                    OutputMode::Mouse
                };
                next.external_mode = ExternalMode::None;
            }
            HeadsetMode::Sideview => {
                next.disabled = false;
                next.output_mode = OutputMode::ExternalOnly;
                next.external_mode = ExternalMode::Sideview;
            }
            HeadsetMode::Disabled => {
                next.disabled = true;
                next.external_mode = ExternalMode::None;
            }
        }
        next
    }

    #[must_use]
    pub fn with_mouse_sensitivity(&self, mouse_sensitivity: u32) -> Self {
        Self {
            mouse_sensitivity,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_display_zoom(&self, display_zoom: f64) -> Self {
        Self {
            display_zoom,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_look_ahead(&self, look_ahead: u32) -> Self {
        Self {
            look_ahead,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sbs_display_size(&self, sbs_display_size: f64) -> Self {
        Self {
            sbs_display_size,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sbs_display_distance(&self, sbs_display_distance: f64) -> Self {
        Self {
            sbs_display_distance,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sbs_content(&self, sbs_content: bool) -> Self {
        Self {
            sbs_content,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sbs_mode_stretched(&self, sbs_mode_stretched: bool) -> Self {
        Self {
            sbs_mode_stretched,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sideview_position(&self, sideview_position: SideviewPosition) -> Self {
        Self {
            sideview_position,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_sideview_display_size(&self, sideview_display_size: f64) -> Self {
        Self {
            sideview_display_size,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_smooth_follow(&self, smooth_follow_enabled: bool) -> Self {
        Self {
            smooth_follow_enabled,
            ..self.clone()
        }
    }

    /// Whether the current output mode is joystick.
    #[inline]
    #[must_use]
    pub fn is_joystick_mode(&self) -> bool {
        self.output_mode == OutputMode::Joystick
    }
}

/// A single user edit, applied with [`ConfigEdit::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEdit {
    HeadsetMode { mode: HeadsetMode, joystick: bool },
    MouseSensitivity(u32),
    DisplayZoom(f64),
    LookAhead(u32),
    SbsDisplaySize(f64),
    SbsDisplayDistance(f64),
    SbsContent(bool),
    SbsModeStretched(bool),
    SideviewPosition(SideviewPosition),
    SideviewDisplaySize(f64),
    SmoothFollow(bool),
}

impl ConfigEdit {
    /// Produce the complete config that results from this edit.
    #[must_use]
    pub fn apply(&self, config: &Config) -> Config {
        match *self {
            Self::HeadsetMode { mode, joystick } => config.with_headset_mode(mode, joystick),
            Self::MouseSensitivity(v) => config.with_mouse_sensitivity(v),
            Self::DisplayZoom(v) => config.with_display_zoom(v),
            Self::LookAhead(v) => config.with_look_ahead(v),
            Self::SbsDisplaySize(v) => config.with_sbs_display_size(v),
            Self::SbsDisplayDistance(v) => config.with_sbs_display_distance(v),
            Self::SbsContent(v) => config.with_sbs_content(v),
            Self::SbsModeStretched(v) => config.with_sbs_mode_stretched(v),
            Self::SideviewPosition(v) => config.with_sideview_position(v),
            Self::SideviewDisplaySize(v) => config.with_sideview_display_size(v),
            Self::SmoothFollow(v) => config.with_smooth_follow(v),
        }
    }
}
