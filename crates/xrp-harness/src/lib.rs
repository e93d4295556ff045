#![forbid(unsafe_code)]

//! Test fixtures for the control panel.
//!
//! - [`ScriptedBackend`]: an in-memory driver agent with queued failures and
//!   a call log.
//! - [`RecordingShell`]: records modals shown and closed and external
//!   navigations, in order.
//! - [`fixtures`]: license and driver-state builders, and [`PanelFixture`],
//!   which wires a [`PanelModel`](xrp_panel::PanelModel) to both on a
//!   deterministic simulator.
//!
//! # Quick Start
//!
//! ```ignore
//! use xrp_harness::{PanelFixture, ScriptedBackend, fixtures};
//!
//! let backend = ScriptedBackend::new().with_driver_state(fixtures::connected("XREAL", "One"));
//! let mut panel = PanelFixture::start(backend);
//! panel.sim.advance(Duration::from_secs(1));
//! assert_eq!(panel.view().device_name, "XREAL One");
//! ```

pub mod backend;
pub mod fixtures;
pub mod shell;

pub use backend::ScriptedBackend;
pub use fixtures::{NOW, PanelFixture};
pub use shell::{RecordingShell, ShellEvent};
