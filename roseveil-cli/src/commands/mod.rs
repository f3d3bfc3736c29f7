//! CLI command implementations.

pub mod common;
pub mod config;
pub mod exe;
pub mod init;
pub mod patch;
pub mod update;
