#![forbid(unsafe_code)]

//! Elm-style runtime for the control panel.
//!
//! A [`Model`] owns all session state and is only mutated inside
//! [`Model::update`]. Side effects are described as [`Cmd`] values and carried
//! out by either the threaded [`Program`] or the deterministic
//! [`ProgramSimulator`].

pub mod clock;
pub mod program;
pub mod simulator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use program::{Cmd, Model, Program, ProgramConfig, ProgramHandle, TaskSpec};
pub use simulator::{CmdRecord, ProgramSimulator};
