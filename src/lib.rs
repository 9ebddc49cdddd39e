//! Seatloop - keeps retrying a train seat reservation across a route catalog
//!
//! Seatloop logs in to the booking provider once, then walks a fixed list of
//! routes positionally, one search-and-reserve attempt at a time, pausing a
//! random backoff between failures. An operator webhook hears about the
//! reservation, about exhaustion, and about unexpected provider errors.

pub mod backoff;
pub mod booking;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod messages;
pub mod notify;

pub use error::{Result, SeatloopError};
