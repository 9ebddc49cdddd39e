//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: poll routes until a seat is reserved (default)
//! - routes: show the catalog and which attempts hit each route
//! - notify: send a test message to the webhook
//! - check: validate config and environment

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use seatloop::config::RetryOverrides;

/// Seatloop - keeps trying to reserve a train seat across a list of routes
#[derive(Parser, Debug)]
#[command(name = "seatloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the route catalog until a seat is reserved or attempts run out
    Run(RunArgs),

    /// List configured routes and the attempts that will try each one
    Routes {
        /// Attempt ceiling to plan for (defaults to the configured value)
        #[arg(short, long)]
        max_attempts: Option<u32>,
    },

    /// Send a one-off message through the configured webhook
    Notify {
        /// Message text
        message: String,
    },

    /// Validate config file and environment without contacting the provider
    Check,
}

/// Options for a reservation run
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Override the maximum number of attempts
    #[arg(short, long)]
    pub max_attempts: Option<u32>,

    /// Override the minimum backoff in seconds
    #[arg(long)]
    pub sleep_min: Option<f64>,

    /// Override the maximum backoff in seconds
    #[arg(long)]
    pub sleep_max: Option<f64>,

    /// Seed the backoff generator for reproducible waits
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use a simulated provider and log notifications instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> RetryOverrides {
        RetryOverrides {
            max_attempts: self.max_attempts,
            sleep_min_secs: self.sleep_min,
            sleep_max_secs: self.sleep_max,
            seed: self.seed,
        }
    }
}
