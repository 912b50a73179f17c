//! Command-line interface.

pub mod commands;

pub use commands::{CheckPositionCmd, CliApp, Command, RunCmd, StatusCmd};
