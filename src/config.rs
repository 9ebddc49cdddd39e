use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::BackoffWindow;
use crate::booking::korail::{DEFAULT_USER_AGENT, KORAIL_BASE_URL};
use crate::booking::{Credentials, KorailConfig};
use crate::controller::RetryPolicy;
use crate::domain::{Route, RouteCatalog};
use crate::error::SeatloopError;

/// Environment variable holding the login phone number
pub const ENV_PHONE: &str = "KORAIL_PHONE";
/// Environment variable holding the login password
pub const ENV_PASSWORD: &str = "KORAIL_PASSWORD";
/// Environment variable holding the webhook URL
pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub retry: RetryConfig,
    pub provider: ProviderConfig,
    pub notifier: NotifierConfig,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub sleep_min_secs: f64,
    pub sleep_max_secs: f64,
    /// Fixed seed for reproducible backoff waits
    pub seed: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            sleep_min_secs: 5.0,
            sleep_max_secs: 10.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: KORAIL_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            retry: RetryConfig::default(),
            provider: ProviderConfig::default(),
            notifier: NotifierConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Command-line overrides for the retry section
#[derive(Debug, Clone, Default)]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
    pub sleep_min_secs: Option<f64>,
    pub sleep_max_secs: Option<f64>,
    pub seed: Option<u64>,
}

impl RetryOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_attempts.is_none()
            && self.sleep_min_secs.is_none()
            && self.sleep_max_secs.is_none()
            && self.seed.is_none()
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = Vec::new();

        // Primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }

        // Fallback location: ./<project>.yml
        candidates.push(PathBuf::from(format!("{}.yml", project_name)));

        Self::load_first_existing(&candidates)
    }

    /// Load the first candidate that exists. A file that exists but does not
    /// parse is an error, never a silent fall through to defaults.
    pub fn load_first_existing(candidates: &[PathBuf]) -> Result<Self> {
        for candidate in candidates {
            if candidate.exists() {
                return Self::load_from_file(candidate)
                    .context(format!("Failed to load config from {}", candidate.display()));
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &RetryOverrides) {
        if let Some(max_attempts) = overrides.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(min) = overrides.sleep_min_secs {
            self.retry.sleep_min_secs = min;
        }
        if let Some(max) = overrides.sleep_max_secs {
            self.retry.sleep_max_secs = max;
        }
        if let Some(seed) = overrides.seed {
            self.retry.seed = Some(seed);
        }
    }

    /// Check everything that can be checked without the network
    pub fn validate(&self) -> Result<()> {
        self.catalog()?;
        self.policy()?;
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<RouteCatalog> {
        RouteCatalog::new(self.routes.clone()).context("No routes configured; add at least one entry under `routes`")
    }

    pub fn policy(&self) -> Result<RetryPolicy> {
        let window = BackoffWindow::from_secs(self.retry.sleep_min_secs, self.retry.sleep_max_secs)?;
        Ok(RetryPolicy::new(self.retry.max_attempts, window)?)
    }

    pub fn korail(&self) -> KorailConfig {
        KorailConfig {
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            user_agent: self.provider.user_agent.clone(),
        }
    }

    pub fn notifier_timeout(&self) -> Duration {
        Duration::from_secs(self.notifier.timeout_secs)
    }
}

/// Credentials and webhook URL taken from the environment
#[derive(Debug, Clone)]
pub struct Secrets {
    pub credentials: Credentials,
    pub webhook_url: String,
}

impl Secrets {
    /// Read all secrets from the process environment
    pub fn from_env() -> std::result::Result<Self, SeatloopError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read all secrets through `lookup`; every value is required and non-empty
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, SeatloopError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SeatloopError::MissingEnv(key.to_string()))
        };

        let phone = require(ENV_PHONE)?;
        let password = require(ENV_PASSWORD)?;
        let webhook_url = require(ENV_WEBHOOK_URL)?;

        Ok(Self {
            credentials: Credentials::new(phone, password),
            webhook_url,
        })
    }
}
