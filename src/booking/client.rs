//! Core reservation client types and trait definitions

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::Route;

/// Booking provider abstraction - authenticate once, then search and reserve per attempt
#[async_trait]
pub trait ReservationClient: Send + Sync {
    /// Log in and obtain the session used by every later call
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, BookingError>;

    /// Search trains matching the query, in provider order.
    ///
    /// Fails with [`BookingError::NoResults`] when nothing matches the filters.
    async fn search_trains(&self, session: &Session, query: &SearchQuery) -> Result<Vec<Train>, BookingError>;

    /// Reserve a seat on the given train
    async fn reserve(&self, session: &Session, train: &Train) -> Result<Seat, BookingError>;
}

/// Login identifier (phone number) and password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"***")
            .finish()
    }
}

/// Opaque authenticated session handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Provider token sent with every request
    pub token: String,
    /// Account holder name, when the provider reports one
    pub holder: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            holder: None,
        }
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }
}

/// Search filters for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub departure: String,
    pub arrival: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Include trains without available seats
    pub include_sold_out: bool,
}

impl SearchQuery {
    /// Query for a route, restricted to trains that still have seats
    pub fn for_route(route: &Route) -> Self {
        Self {
            departure: route.departure.clone(),
            arrival: route.arrival.clone(),
            date: route.date,
            time: route.time,
            include_sold_out: false,
        }
    }
}

/// A train returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub number: String,
    /// Train class name (e.g. KTX)
    pub kind: String,
    pub departure: String,
    pub arrival: String,
    pub date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    /// Provider payload needed to reserve this train
    #[serde(default)]
    pub provider_ref: serde_json::Value,
}

impl fmt::Display for Train {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} {} ({}) -> {} {}",
            self.kind,
            self.number,
            self.departure,
            self.departure_time.format("%H:%M"),
            self.date.format("%m/%d"),
            self.arrival,
            self.arrival_time.format("%H:%M")
        )
    }
}

/// A reserved seat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Provider reservation number
    pub reservation_id: String,
    pub train: Train,
    /// Seat class or placement, when known
    pub detail: Option<String>,
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} reservation {}", self.train, self.reservation_id)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// Errors that can occur while talking to the booking provider
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("No trains matched the search filters")]
    NoResults,

    #[error("Train sold out before the reservation went through")]
    SoldOut,

    #[error("Provider error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BookingError {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }
}
