//! Randomized pause between unsuccessful attempts.
//!
//! The wait is drawn uniformly from a fixed `[min, max]` window. Both the
//! duration source and the sleeper are traits so runs can be replayed with
//! deterministic waits and without real sleeping.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SeatloopError};

/// Inclusive bounds for a single backoff wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffWindow {
    pub min: Duration,
    pub max: Duration,
}

impl BackoffWindow {
    /// Build a window from seconds. Requires `0 <= min <= max`.
    pub fn from_secs(min_secs: f64, max_secs: f64) -> Result<Self> {
        if !min_secs.is_finite() || !max_secs.is_finite() || min_secs < 0.0 {
            return Err(SeatloopError::Config(format!(
                "backoff bounds must be finite and non-negative, got [{}, {}]",
                min_secs, max_secs
            )));
        }
        if min_secs > max_secs {
            return Err(SeatloopError::Config(format!(
                "sleep_min_secs ({}) is greater than sleep_max_secs ({})",
                min_secs, max_secs
            )));
        }
        Ok(Self {
            min: to_duration(min_secs)?,
            max: to_duration(max_secs)?,
        })
    }

    pub fn contains(&self, wait: Duration) -> bool {
        wait >= self.min && wait <= self.max
    }
}

fn to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| SeatloopError::Config(format!("backoff bound {}s is out of range: {}", secs, e)))
}

/// Source of wait durations.
pub trait WaitSource: Send {
    /// Next wait duration, within `[min, max]`
    fn next_wait(&mut self, min: Duration, max: Duration) -> Duration;
}

/// Uniformly random waits.
pub struct UniformWait {
    rng: StdRng,
}

impl UniformWait {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence of waits
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformWait {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitSource for UniformWait {
    fn next_wait(&mut self, min: Duration, max: Duration) -> Duration {
        if min >= max {
            return min;
        }
        let secs = self.rng.gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(min, max)
    }
}

/// Always the same wait, clamped into the window.
#[derive(Debug, Clone, Copy)]
pub struct FixedWait(pub Duration);

impl WaitSource for FixedWait {
    fn next_wait(&mut self, min: Duration, max: Duration) -> Duration {
        self.0.clamp(min, max.max(min))
    }
}

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
    }
}
