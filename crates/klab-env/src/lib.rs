//! Environment resolution for the klab harness.
//!
//! A small set of user-chosen identifiers (architecture, per-tool build IDs,
//! run ID, engine selection) expands into the full namespace of directories,
//! files and ports that every build and run step agrees on. Resolution is a
//! pure function of the options; creating the directories is a separate,
//! idempotent step.

pub mod arch;
pub mod config;
pub mod layout;
pub mod options;
pub mod ports;

pub use arch::Arch;
pub use config::ConfigOverlay;
pub use layout::{BuildNamespace, Env, RunMode, RunNamespace};
pub use options::{CommonArgs, ResolvedOptions, DEFAULT_BUILD_ID};
pub use ports::PortAssignment;
