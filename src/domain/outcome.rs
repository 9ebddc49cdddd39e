//! Attempt outcome types.
//!
//! Every attempt ends in exactly one [`AttemptOutcome`]. Provider errors are
//! folded into outcomes by [`classify`] instead of propagating.

use std::fmt;

use crate::booking::{BookingError, Seat};
use crate::domain::Route;

/// Outcome of one search-and-reserve attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// A seat was reserved
    Success(Seat),
    /// Search returned no candidate meeting the filters
    NoSeats,
    /// A candidate existed but sold out before the reservation went through
    SoldOut,
    /// Any other failure, including network and session errors
    Error(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    /// Short label for console and log output
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::NoSeats => "no seats",
            AttemptOutcome::SoldOut => "sold out",
            AttemptOutcome::Error(_) => "error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success(seat) => write!(f, "reserved {}", seat),
            AttemptOutcome::NoSeats => write!(f, "No seats left."),
            AttemptOutcome::SoldOut => write!(f, "Sold out."),
            AttemptOutcome::Error(detail) => write!(f, "Error: {}", detail),
        }
    }
}

/// Map a provider error raised inside an attempt to its outcome.
pub fn classify(err: BookingError) -> AttemptOutcome {
    match err {
        BookingError::NoResults => AttemptOutcome::NoSeats,
        BookingError::SoldOut => AttemptOutcome::SoldOut,
        other => AttemptOutcome::Error(other.to_string()),
    }
}

/// One finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 0-based attempt index
    pub index: u32,
    pub route: Route,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    /// The reserved seat, on success
    pub fn seat(&self) -> Option<&Seat> {
        match &self.outcome {
            AttemptOutcome::Success(seat) => Some(seat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_recoverable() {
        assert_eq!(classify(BookingError::NoResults), AttemptOutcome::NoSeats);
        assert_eq!(classify(BookingError::SoldOut), AttemptOutcome::SoldOut);
    }

    #[test]
    fn test_classify_generic() {
        let outcome = classify(BookingError::remote("P058", "login required"));
        assert_eq!(
            outcome,
            AttemptOutcome::Error("Provider error P058: login required".to_string())
        );

        let outcome = classify(BookingError::Auth("session expired".to_string()));
        assert!(matches!(outcome, AttemptOutcome::Error(_)));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::NoSeats.label(), "no seats");
        assert_eq!(AttemptOutcome::SoldOut.label(), "sold out");
        assert_eq!(AttemptOutcome::Error("x".into()).label(), "error");
        assert!(!AttemptOutcome::NoSeats.is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(AttemptOutcome::NoSeats.to_string(), "No seats left.");
        assert_eq!(AttemptOutcome::Error("boom".into()).to_string(), "Error: boom");
    }
}
