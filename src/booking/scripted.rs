//! Deterministic in-memory reservation client.
//!
//! Plays back one scripted step per attempt, then repeats a fallback step.
//! Used by tests and by `--dry-run`, where the provider must not be touched.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveTime, Timelike};

use crate::booking::client::{BookingError, Credentials, ReservationClient, SearchQuery, Seat, Session, Train};

/// What a single attempt should run into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Search finds a train and the reservation succeeds
    Reserve,
    /// Search fails with NoResults
    NoResults,
    /// Search succeeds with an empty list
    EmptySearch,
    /// Search finds a train, reservation fails with SoldOut
    SoldOut,
    /// Search fails with a generic provider error
    SearchError(String),
    /// Search finds a train, reservation fails with a generic provider error
    ReserveError(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    current: Option<ScriptStep>,
    searches: Vec<SearchQuery>,
    reserved: Vec<String>,
    logins: u32,
}

/// Scripted ReservationClient
#[derive(Debug)]
pub struct ScriptedClient {
    state: Mutex<ScriptState>,
    fallback: ScriptStep,
    auth_failure: Option<String>,
}

impl ScriptedClient {
    /// Play `steps` in order, one per attempt, then keep returning NoResults
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                steps: steps.into(),
                ..Default::default()
            }),
            fallback: ScriptStep::NoResults,
            auth_failure: None,
        }
    }

    /// Return the same step for every attempt
    pub fn always(step: ScriptStep) -> Self {
        let mut client = Self::new(vec![]);
        client.fallback = step;
        client
    }

    /// Make `authenticate` fail with the given message
    pub fn with_auth_failure(mut self, message: impl Into<String>) -> Self {
        self.auth_failure = Some(message.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every query seen by `search_trains`, in order
    pub fn searches(&self) -> Vec<SearchQuery> {
        self.lock().searches.clone()
    }

    /// Train numbers passed to `reserve`, in order
    pub fn reserved(&self) -> Vec<String> {
        self.lock().reserved.clone()
    }

    pub fn logins(&self) -> u32 {
        self.lock().logins
    }
}

fn scripted_train(query: &SearchQuery, attempt: usize, offset: usize) -> Train {
    let minutes = (query.time.hour() * 60 + query.time.minute() + 150) % (24 * 60);
    Train {
        number: format!("{}", 100 + attempt * 10 + offset),
        kind: "KTX".to_string(),
        departure: query.departure.clone(),
        arrival: query.arrival.clone(),
        date: query.date,
        departure_time: query.time,
        arrival_time: NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(query.time),
        provider_ref: serde_json::Value::Null,
    }
}

#[async_trait]
impl ReservationClient for ScriptedClient {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<Session, BookingError> {
        self.lock().logins += 1;
        match &self.auth_failure {
            Some(message) => Err(BookingError::Auth(message.clone())),
            None => Ok(Session::new("scripted-session").with_holder("scripted")),
        }
    }

    async fn search_trains(&self, _session: &Session, query: &SearchQuery) -> Result<Vec<Train>, BookingError> {
        let mut state = self.lock();
        let attempt = state.searches.len();
        state.searches.push(query.clone());
        let step = state.steps.pop_front().unwrap_or_else(|| self.fallback.clone());
        state.current = Some(step.clone());

        match step {
            ScriptStep::NoResults => Err(BookingError::NoResults),
            ScriptStep::EmptySearch => Ok(Vec::new()),
            ScriptStep::SearchError(message) => Err(BookingError::remote("SCRIPTED", message)),
            ScriptStep::Reserve | ScriptStep::SoldOut | ScriptStep::ReserveError(_) => Ok(vec![
                scripted_train(query, attempt, 0),
                scripted_train(query, attempt, 1),
            ]),
        }
    }

    async fn reserve(&self, _session: &Session, train: &Train) -> Result<Seat, BookingError> {
        let mut state = self.lock();
        state.reserved.push(train.number.clone());

        match state.current.take() {
            Some(ScriptStep::Reserve) => Ok(Seat {
                reservation_id: format!("SCRIPTED-{}", train.number),
                train: train.clone(),
                detail: Some("general".to_string()),
            }),
            Some(ScriptStep::SoldOut) => Err(BookingError::SoldOut),
            Some(ScriptStep::ReserveError(message)) => Err(BookingError::remote("SCRIPTED", message)),
            _ => Err(BookingError::InvalidResponse("reserve called without a scripted train".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Route;

    fn query() -> SearchQuery {
        SearchQuery::for_route(&Route::parse("전주", "서울", "20240917", "193000").unwrap())
    }

    #[tokio::test]
    async fn test_steps_then_fallback() {
        let client = ScriptedClient::new(vec![ScriptStep::SoldOut, ScriptStep::Reserve]);
        let session = client.authenticate(&Credentials::new("id", "pw")).await.unwrap();

        let trains = client.search_trains(&session, &query()).await.unwrap();
        assert!(matches!(client.reserve(&session, &trains[0]).await, Err(BookingError::SoldOut)));

        let trains = client.search_trains(&session, &query()).await.unwrap();
        let seat = client.reserve(&session, &trains[0]).await.unwrap();
        assert_eq!(seat.train.number, "110");

        assert!(matches!(
            client.search_trains(&session, &query()).await,
            Err(BookingError::NoResults)
        ));
        assert_eq!(client.searches().len(), 3);
        assert_eq!(client.reserved(), vec!["100", "110"]);
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let client = ScriptedClient::always(ScriptStep::Reserve).with_auth_failure("expired");
        let err = client.authenticate(&Credentials::new("id", "pw")).await.unwrap_err();
        assert!(matches!(err, BookingError::Auth(ref m) if m == "expired"));
        assert_eq!(client.logins(), 1);
    }

    #[test]
    fn test_scripted_train_arrival_wraps_midnight() {
        let route = Route::parse("서울", "부산", "20240917", "230000").unwrap();
        let train = scripted_train(&SearchQuery::for_route(&route), 0, 0);
        assert_eq!(train.arrival_time, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }
}
