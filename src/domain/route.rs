//! Route definitions and the ordered route catalog.
//!
//! Routes are read from configuration once at startup and never change
//! afterwards. Dates and times use the provider's compact formats
//! (`YYYYMMDD` and `HHMMSS`) on the wire and in config files.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeatloopError};

/// Compact date format used by the provider and config files.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Compact time-of-day format used by the provider and config files.
pub const TIME_FORMAT: &str = "%H%M%S";

/// A single departure/arrival/date/time request.
///
/// Config records go through [`Route::parse`], so a deserialized route obeys
/// the same rules as one built in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RouteRecord", into = "RouteRecord")]
pub struct Route {
    /// Departure station name, matched against the provider's naming
    pub departure: String,
    /// Arrival station name
    pub arrival: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Catalog record as it appears in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteRecord {
    departure: String,
    arrival: String,
    date: String,
    time: String,
}

impl TryFrom<RouteRecord> for Route {
    type Error = SeatloopError;

    fn try_from(record: RouteRecord) -> Result<Self> {
        Route::parse(&record.departure, &record.arrival, &record.date, &record.time)
    }
}

impl From<Route> for RouteRecord {
    fn from(route: Route) -> Self {
        Self {
            date: route.date_str(),
            time: route.time_str(),
            departure: route.departure,
            arrival: route.arrival,
        }
    }
}

impl Route {
    /// Build a route from the four string fields of a catalog record.
    pub fn parse(departure: &str, arrival: &str, date: &str, time: &str) -> Result<Self> {
        let departure = departure.trim();
        let arrival = arrival.trim();
        if departure.is_empty() || arrival.is_empty() {
            return Err(SeatloopError::InvalidRoute(
                "departure and arrival stations are required".to_string(),
            ));
        }

        let date = parse_date(date).map_err(SeatloopError::InvalidRoute)?;
        let time = parse_time(time).map_err(SeatloopError::InvalidRoute)?;

        Ok(Self {
            departure: departure.to_string(),
            arrival: arrival.to_string(),
            date,
            time,
        })
    }

    /// Travel date as `YYYYMMDD`.
    pub fn date_str(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Departure time as `HHMMSS`.
    pub fn time_str(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}, date: {}, time: {}",
            self.departure,
            self.arrival,
            self.date_str(),
            self.time_str()
        )
    }
}

pub(crate) fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    let value = value.trim();
    if value.len() != 8 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("travel date '{}' must be YYYYMMDD", value));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| format!("travel date '{}': {}", value, e))
}

pub(crate) fn parse_time(value: &str) -> std::result::Result<NaiveTime, String> {
    let value = value.trim();
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("travel time '{}' must be HHMMSS", value));
    }
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|e| format!("travel time '{}': {}", value, e))
}

/// Ordered, non-empty list of routes cycled positionally across attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCatalog {
    routes: Vec<Route>,
}

impl RouteCatalog {
    /// Create a catalog. Fails if `routes` is empty.
    pub fn new(routes: Vec<Route>) -> Result<Self> {
        if routes.is_empty() {
            return Err(SeatloopError::Config("route catalog is empty".to_string()));
        }
        Ok(Self { routes })
    }

    /// Route for the given attempt index: `routes[attempt % len]`.
    ///
    /// Selection ignores which routes already failed, so short runs may never
    /// reach the tail of the catalog and long runs revisit routes.
    pub fn select(&self, attempt: u32) -> &Route {
        &self.routes[attempt as usize % self.routes.len()]
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Attempt indices (0-based) that select each route within `max_attempts`.
    ///
    /// Entry `i` lists the attempts that will try `routes[i]`; an empty entry
    /// means the route is never tried.
    pub fn schedule(&self, max_attempts: u32) -> Vec<Vec<u32>> {
        let mut slots = vec![Vec::new(); self.routes.len()];
        for attempt in 0..max_attempts {
            slots[attempt as usize % self.routes.len()].push(attempt);
        }
        slots
    }
}
