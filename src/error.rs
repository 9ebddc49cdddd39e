//! Error types for Seatloop
//!
//! Centralized error handling using thiserror. Attempt-level provider errors
//! live in [`crate::booking::BookingError`] and are classified into outcomes;
//! only startup failures surface here.

use thiserror::Error;

use crate::booking::BookingError;

/// All error types that can stop Seatloop before or outside the retry loop
#[derive(Debug, Error)]
pub enum SeatloopError {
    /// Invalid or incomplete configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Required environment variable missing or empty
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    /// Route definition could not be parsed
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Authentication with the booking provider failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Booking provider error outside an attempt boundary
    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Seatloop operations
pub type Result<T> = std::result::Result<T, SeatloopError>;
