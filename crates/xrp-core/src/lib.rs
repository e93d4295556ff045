#![forbid(unsafe_code)]

//! Core: license snapshots, entitlement evaluation, driver config and state,
//! optimistic control-flag reconciliation, and value stabilization.

pub mod config;
pub mod driver_state;
pub mod entitlement;
pub mod license;
pub mod logging;
pub mod reconciler;
pub mod stabilizer;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, info, trace, warn};
