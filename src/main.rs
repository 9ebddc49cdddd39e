use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod cli;

use cli::{Cli, Commands, RunArgs};
use seatloop::backoff::UniformWait;
use seatloop::booking::{Credentials, KorailClient, ReservationClient, ScriptStep, ScriptedClient};
use seatloop::config::{Config, ENV_WEBHOOK_URL, Secrets};
use seatloop::controller::{RetryController, RetryPolicy, RunContext, RunOutcome, authenticate};
use seatloop::domain::RouteCatalog;
use seatloop::error::SeatloopError;
use seatloop::notify::{LogNotifier, Notifier, WebhookNotifier};

/// Exit code for config, environment and authentication failures
const EXIT_STARTUP_FAILURE: u8 = 2;

fn setup_logging(default_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seatloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("seatloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(default_level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli) -> Result<u8> {
    let dotenv = dotenvy::dotenv();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    match dotenv {
        Ok(path) => info!("Loaded .env from: {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }
    info!("Starting with config from: {:?}", cli.config);

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_run_command(&RunArgs::default(), config).await,
        Some(Commands::Run(args)) => handle_run_command(args, config).await,
        Some(Commands::Routes { max_attempts }) => handle_routes_command(*max_attempts, &config),
        Some(Commands::Notify { message }) => handle_notify_command(message, &config).await,
        Some(Commands::Check) => handle_check_command(&config),
    }
}

async fn handle_run_command(args: &RunArgs, mut config: Config) -> Result<u8> {
    config.apply_overrides(&args.overrides());
    config.validate().context("Invalid configuration")?;

    let catalog = config.catalog()?;
    let policy = config.policy()?;
    let waits = match config.retry.seed {
        Some(seed) => UniformWait::seeded(seed),
        None => UniformWait::new(),
    };

    if args.dry_run {
        println!("{}", "Dry run: simulated provider, notifications are only logged".yellow());
        let client: Arc<dyn ReservationClient> = Arc::new(ScriptedClient::always(ScriptStep::NoResults));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let credentials = Credentials::new("dry-run", "dry-run");
        return execute_run(client, notifier, &credentials, catalog, policy, waits).await;
    }

    let secrets = Secrets::from_env().context("Required environment is incomplete")?;
    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(&secrets.webhook_url, config.notifier_timeout())?);
    let client: Arc<dyn ReservationClient> =
        Arc::new(KorailClient::new(config.korail()).context("Failed to create Korail client")?);

    execute_run(client, notifier, &secrets.credentials, catalog, policy, waits).await
}

async fn execute_run(
    client: Arc<dyn ReservationClient>,
    notifier: Arc<dyn Notifier>,
    credentials: &Credentials,
    catalog: RouteCatalog,
    policy: RetryPolicy,
    waits: UniformWait,
) -> Result<u8> {
    let session = authenticate(client.as_ref(), credentials).await?;
    let ctx = RunContext {
        session,
        catalog,
        policy,
    };

    let mut controller = RetryController::new(client, notifier).with_wait_source(waits);
    let report = controller.run(&ctx).await;

    match &report.outcome {
        RunOutcome::Succeeded { attempt, route, seat } => {
            info!("Reserved {} on attempt {} ({})", seat.reservation_id, attempt + 1, route)
        }
        RunOutcome::Exhausted { attempts } => info!("No seat after {} attempts", attempts),
    }
    Ok(report.outcome.exit_code())
}

fn handle_routes_command(max_attempts: Option<u32>, config: &Config) -> Result<u8> {
    let catalog = config.catalog()?;
    let max_attempts = max_attempts.unwrap_or(config.retry.max_attempts);
    println!("{} ({} attempts)", "Route catalog:".green(), max_attempts);

    for (route, attempts) in catalog.iter().zip(catalog.schedule(max_attempts)) {
        let when = if attempts.is_empty() {
            "never tried".dimmed().to_string()
        } else {
            let numbers: Vec<String> = attempts.iter().map(|a| (a + 1).to_string()).collect();
            format!("attempts {}", numbers.join(", "))
        };
        println!("  {}  {}", route, when);
    }
    Ok(0)
}

async fn handle_notify_command(message: &str, config: &Config) -> Result<u8> {
    let url = std::env::var(ENV_WEBHOOK_URL).map_err(|_| SeatloopError::MissingEnv(ENV_WEBHOOK_URL.to_string()))?;
    let notifier = WebhookNotifier::new(&url, config.notifier_timeout())?;

    match notifier.deliver(message).await {
        Ok(()) => {
            println!("{}", "Message delivered".green());
            Ok(0)
        }
        Err(e) => {
            println!("{} {}", "Delivery failed:".red(), e);
            Ok(1)
        }
    }
}

fn handle_check_command(config: &Config) -> Result<u8> {
    config.validate().context("Invalid configuration")?;
    let secrets = Secrets::from_env().context("Required environment is incomplete")?;
    WebhookNotifier::new(&secrets.webhook_url, config.notifier_timeout())?;

    println!("{}", "Configuration OK".green());
    println!("  routes: {}", config.routes.len());
    println!(
        "  attempts: {}, backoff: {}s..{}s",
        config.retry.max_attempts, config.retry.sleep_min_secs, config.retry.sleep_max_secs
    );
    println!("  provider: {}", config.provider.base_url);
    Ok(0)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    match run_application(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:?}", "Error:".red().bold(), e);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}
