//! Retry controller - drives attempts until a seat is reserved or attempts run out.
//!
//! Each iteration:
//! 1. Picks `catalog[attempts_made % len]`
//! 2. Searches and reserves the first train returned
//! 3. Classifies the result into exactly one outcome
//! 4. On success: notifies and stops
//! 5. Otherwise: counts the failure and, if attempts remain, sleeps a random backoff
//!
//! After the last failed attempt the exhaustion notice goes out and no sleep follows.

use std::sync::Arc;
use std::time::Duration;

use colored::*;

use crate::backoff::{BackoffWindow, Sleeper, TokioSleeper, UniformWait, WaitSource};
use crate::booking::{Credentials, ReservationClient, SearchQuery, Seat, Session};
use crate::domain::{Attempt, AttemptOutcome, ControllerPhase, Route, RouteCatalog, RetryState, classify};
use crate::error::{Result, SeatloopError};
use crate::messages;

/// Attempt ceiling and backoff window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub window: BackoffWindow,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, window: BackoffWindow) -> Result<Self> {
        if max_attempts == 0 {
            return Err(SeatloopError::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(Self { max_attempts, window })
    }
}

/// Everything a run needs that is fixed at startup.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub session: Session,
    pub catalog: RouteCatalog,
    pub policy: RetryPolicy,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Seat reserved on attempt `attempt` (0-based)
    Succeeded { attempt: u32, route: Route, seat: Seat },
    /// `attempts` non-success outcomes, no seat
    Exhausted { attempts: u32 },
}

impl RunOutcome {
    /// Process exit code: 0 on success, 1 on exhaustion
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Succeeded { .. } => 0,
            RunOutcome::Exhausted { .. } => 1,
        }
    }
}

/// Full trace of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub attempts: Vec<Attempt>,
    /// Backoff waits actually slept, in order
    pub waits: Vec<Duration>,
    pub phase: ControllerPhase,
}

/// Log in once before the loop. Any failure here is fatal.
pub async fn authenticate<C>(client: &C, credentials: &Credentials) -> Result<Session>
where
    C: ReservationClient + ?Sized,
{
    client.authenticate(credentials).await.map_err(|e| {
        log::error!("Authentication failed: {}", e);
        SeatloopError::Auth(e.to_string())
    })
}

/// Sequential retry loop over a route catalog.
pub struct RetryController<C, N>
where
    C: ReservationClient + ?Sized,
    N: crate::notify::Notifier + ?Sized,
{
    client: Arc<C>,
    notifier: Arc<N>,
    waits: Box<dyn WaitSource>,
    sleeper: Arc<dyn Sleeper>,
}

impl<C, N> RetryController<C, N>
where
    C: ReservationClient + ?Sized,
    N: crate::notify::Notifier + ?Sized,
{
    /// Controller with uniformly random waits and real sleeping.
    pub fn new(client: Arc<C>, notifier: Arc<N>) -> Self {
        Self {
            client,
            notifier,
            waits: Box::new(UniformWait::new()),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_wait_source(mut self, waits: impl WaitSource + 'static) -> Self {
        self.waits = Box::new(waits);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// One search-and-reserve cycle. Always yields exactly one outcome.
    pub async fn attempt(&self, session: &Session, route: &Route) -> AttemptOutcome {
        let query = SearchQuery::for_route(route);
        let trains = match self.client.search_trains(session, &query).await {
            Ok(trains) => trains,
            Err(e) => return classify(e),
        };

        // First available, no fare or seat optimisation
        let Some(candidate) = trains.first() else {
            return AttemptOutcome::NoSeats;
        };
        log::debug!("Reserving {}", candidate);

        match self.client.reserve(session, candidate).await {
            Ok(seat) => AttemptOutcome::Success(seat),
            Err(e) => classify(e),
        }
    }

    /// Run until the first success or until `max_attempts` failures.
    pub async fn run(&mut self, ctx: &RunContext) -> RunReport {
        let policy = ctx.policy;
        let mut state = RetryState::new(policy.max_attempts);
        let mut attempts = Vec::new();
        let mut waits = Vec::new();

        log::info!(
            "Starting run: {} routes, max {} attempts, backoff {:?}..={:?}",
            ctx.catalog.len(),
            policy.max_attempts,
            policy.window.min,
            policy.window.max
        );

        while !state.is_terminal() {
            let index = state.next_index();
            let route = ctx.catalog.select(index);
            state.begin_attempt();

            println!("\n{}", messages::attempt_header(index, policy.max_attempts, route).bold());
            let outcome = self.attempt(&ctx.session, route).await;
            log::info!("Attempt {} on {}: {}", index + 1, route, outcome.label());

            attempts.push(Attempt {
                index,
                route: route.clone(),
                outcome: outcome.clone(),
            });

            match outcome {
                AttemptOutcome::Success(seat) => {
                    state.record_success();
                    println!("\n{}", messages::success_console(route, &seat).green());
                    self.notifier.notify(&messages::success_message(route, &seat)).await;
                    println!("{}", "Reservation succeeded, stopping.".green().bold());

                    return RunReport {
                        outcome: RunOutcome::Succeeded {
                            attempt: index,
                            route: route.clone(),
                            seat,
                        },
                        attempts,
                        waits,
                        phase: state.phase(),
                    };
                }
                AttemptOutcome::NoSeats | AttemptOutcome::SoldOut => {
                    print!("{} ", outcome.to_string().yellow());
                }
                AttemptOutcome::Error(ref detail) => {
                    // Reported right away, but the loop keeps going
                    log::warn!("Attempt {} failed: {}", index + 1, detail);
                    println!("{}", outcome.to_string().red());
                    self.notifier.notify(&messages::error_message(detail)).await;
                }
            }

            if state.record_failure() {
                let wait = self.waits.next_wait(policy.window.min, policy.window.max);
                println!("{}", messages::retry_notice(wait.as_secs_f64()));
                log::debug!("Sleeping {:?} before attempt {}", wait, state.next_index() + 1);
                waits.push(wait);
                self.sleeper.sleep(wait).await;
            } else {
                println!();
            }
        }

        println!("\n{}", messages::exhaustion_console(policy.max_attempts).red().bold());
        log::warn!("Exhausted after {} attempts", state.attempts_made);
        self.notifier.notify(&messages::exhaustion_message(policy.max_attempts)).await;

        RunReport {
            outcome: RunOutcome::Exhausted {
                attempts: state.attempts_made,
            },
            attempts,
            waits,
            phase: state.phase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{FixedWait, RecordingSleeper};
    use crate::booking::{ScriptStep, ScriptedClient};
    use crate::notify::RecordingNotifier;

    fn catalog() -> RouteCatalog {
        RouteCatalog::new(vec![
            Route::parse("전주", "서울", "20240917", "193000").unwrap(),
            Route::parse("광주송정", "서울", "20240918", "090000").unwrap(),
        ])
        .unwrap()
    }

    fn context(max_attempts: u32) -> RunContext {
        RunContext {
            session: Session::new("test"),
            catalog: catalog(),
            policy: RetryPolicy::new(max_attempts, BackoffWindow::from_secs(5.0, 10.0).unwrap()).unwrap(),
        }
    }

    fn controller(
        client: ScriptedClient,
    ) -> (
        RetryController<ScriptedClient, RecordingNotifier>,
        Arc<ScriptedClient>,
        Arc<RecordingNotifier>,
        Arc<RecordingSleeper>,
    ) {
        let client = Arc::new(client);
        let notifier = Arc::new(RecordingNotifier::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let controller = RetryController::new(client.clone(), notifier.clone())
            .with_wait_source(FixedWait(Duration::from_secs(6)))
            .with_sleeper(sleeper.clone());
        (controller, client, notifier, sleeper)
    }

    #[test]
    fn test_policy_requires_an_attempt() {
        let window = BackoffWindow::from_secs(1.0, 2.0).unwrap();
        assert!(RetryPolicy::new(0, window).is_err());
        assert!(RetryPolicy::new(1, window).is_ok());
    }

    #[tokio::test]
    async fn test_attempt_classifies_each_path_once() {
        let cases = vec![
            (ScriptStep::Reserve, "success"),
            (ScriptStep::NoResults, "no seats"),
            (ScriptStep::EmptySearch, "no seats"),
            (ScriptStep::SoldOut, "sold out"),
            (ScriptStep::SearchError("boom".into()), "error"),
            (ScriptStep::ReserveError("boom".into()), "error"),
        ];

        for (step, expected) in cases {
            let (controller, _, _, _) = controller(ScriptedClient::new(vec![step.clone()]));
            let route = catalog().select(0).clone();
            let outcome = controller.attempt(&Session::new("t"), &route).await;
            assert_eq!(outcome.label(), expected, "step {:?}", step);
        }
    }

    #[tokio::test]
    async fn test_attempt_reserves_first_train() {
        let (controller, client, _, _) = controller(ScriptedClient::new(vec![ScriptStep::Reserve]));
        let route = catalog().select(0).clone();
        let outcome = controller.attempt(&Session::new("t"), &route).await;
        assert!(outcome.is_success());
        assert_eq!(client.reserved(), vec!["100"]);
    }

    #[tokio::test]
    async fn test_run_exhausts_without_trailing_sleep() {
        let (mut controller, client, notifier, sleeper) = controller(ScriptedClient::always(ScriptStep::NoResults));
        let report = controller.run(&context(3)).await;

        assert_eq!(report.outcome, RunOutcome::Exhausted { attempts: 3 });
        assert_eq!(report.phase, ControllerPhase::Exhausted);
        assert_eq!(client.searches().len(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);
        assert_eq!(report.waits, sleeper.sleeps());
        assert_eq!(notifier.messages(), vec![messages::exhaustion_message(3)]);
    }

    #[tokio::test]
    async fn test_run_stops_on_first_success() {
        let steps = vec![ScriptStep::SoldOut, ScriptStep::NoResults, ScriptStep::Reserve];
        let (mut controller, client, notifier, sleeper) = controller(ScriptedClient::new(steps));
        let report = controller.run(&context(5)).await;

        match &report.outcome {
            RunOutcome::Succeeded { attempt, route, .. } => {
                assert_eq!(*attempt, 2);
                assert_eq!(route.departure, "전주");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(client.searches().len(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);

        let sent = notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with(":tada:"));
    }

    #[tokio::test]
    async fn test_error_outcome_notifies_and_continues() {
        let steps = vec![ScriptStep::SearchError("session expired".into()), ScriptStep::NoResults];
        let (mut controller, _, notifier, _) = controller(ScriptedClient::new(steps));
        let report = controller.run(&context(2)).await;

        assert_eq!(report.outcome, RunOutcome::Exhausted { attempts: 2 });
        let sent = notifier.messages();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("Other error occurred:"));
        assert!(sent[0].contains("session expired"));
        assert_eq!(sent[1], messages::exhaustion_message(2));
    }

    #[tokio::test]
    async fn test_authenticate_maps_to_auth_error() {
        let client = ScriptedClient::always(ScriptStep::Reserve).with_auth_failure("bad password");
        let err = authenticate(&client, &Credentials::new("id", "pw")).await.unwrap_err();
        assert!(matches!(err, SeatloopError::Auth(_)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Exhausted { attempts: 3 }.exit_code(), 1);
    }
}
