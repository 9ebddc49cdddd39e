//! Booking provider layer - the external reservation service behind a trait
//!
//! This module provides:
//! - ReservationClient trait and its request/response types
//! - KorailClient implementation over the Korail mobile API
//! - ScriptedClient for deterministic runs

pub mod client;
pub mod korail;
pub mod scripted;

pub use client::{BookingError, Credentials, ReservationClient, SearchQuery, Seat, Session, Train};
pub use korail::{KorailClient, KorailConfig};
pub use scripted::{ScriptStep, ScriptedClient};
