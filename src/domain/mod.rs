//! Domain types for Seatloop
//!
//! This module contains the core domain types:
//! - Route / RouteCatalog: what to try, cycled positionally per attempt
//! - AttemptOutcome / Attempt: result of one search-and-reserve cycle
//! - RetryState / ControllerPhase: counters and phases of the retry loop

pub mod outcome;
pub mod route;
pub mod state;

pub use outcome::{Attempt, AttemptOutcome, classify};
pub use route::{Route, RouteCatalog};
pub use state::{ControllerPhase, RetryState};
