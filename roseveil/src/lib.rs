//! Rose Veil launcher core.
//!
//! Verified, resumable installation of the game patch and of launcher
//! updates, plus the settings and logging the launcher runs with.
//!
//! - [`manager`]: install pipeline, verify/repair, toggle, self-update
//! - [`package`]: manifest, install record and version types
//! - [`config`]: layered settings and the launcher's own state file
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod logging;
pub mod manager;
pub mod package;
