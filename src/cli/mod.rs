//! CLI module for seatloop - command-line interface and subcommands.
//!
//! Running without a subcommand starts the reservation loop.

pub mod commands;

pub use commands::{Cli, Commands, RunArgs};
