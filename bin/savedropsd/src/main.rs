//! ---
//! sd_section: "06-daemon"
//! sd_subsection: "binary"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Binary entrypoint for the Save Drops daemon."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use savedrops_backend::{AccountDirectory, AuthError, AuthService, DocumentStore, UserSession};
use savedrops_common::config::AppConfig;
use savedrops_common::logging::init_tracing;
use savedrops_dashboard::{ensure_bill, DashboardReader};
use savedrops_sim::{new_registry, SimulationEngine, SimulationRunner};
use tokio::signal;
use tracing::info;

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(author, version, about = "Save Drops daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the simulation and dashboard reader")]
    Run,
    #[command(about = "Create the demo account with profile and settings")]
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("savedropsd", &config.logging)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");

    match cli.command {
        Some(Commands::Seed) => seed(&config),
        Some(Commands::Run) | None => run(config).await,
    }
}

/// Sign in with the configured demo account, creating it on first run.
fn demo_session(auth: &AuthService, config: &AppConfig) -> Result<UserSession> {
    let account = &config.demo_account;
    match auth.sign_in(&account.email, &account.password) {
        Ok(session) => Ok(session),
        Err(AuthError::InvalidCredentials) => auth
            .sign_up(&account.email, &account.password)
            .context("unable to create demo account"),
        Err(err) => Err(err).context("demo account sign-in failed"),
    }
}

fn seed(config: &AppConfig) -> Result<()> {
    let store = DocumentStore::new();
    let auth = AuthService::new(store.clone());
    let session = demo_session(&auth, config)?;

    let directory = AccountDirectory::new(store.clone());
    directory
        .save_profile(&session.user_id, &Default::default())
        .context("unable to seed profile")?;
    directory
        .save_settings(&session.user_id, &Default::default())
        .context("unable to seed settings")?;
    let bill = ensure_bill(&store, &session.user_id)?;
    info!(user = %session.user_id, bill, "demo account seeded");
    auth.sign_out();
    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    let store = DocumentStore::new();
    let auth = AuthService::new(store.clone());
    let session = demo_session(&auth, &config)?;
    info!(user = %session.user_id, email = %session.email, "session opened");

    let registry = new_registry();
    let engine = SimulationEngine::new(&session.user_id, config.simulation.random_seed);
    let runner = SimulationRunner::spawn(engine, store.clone(), &config.simulation, &registry)
        .context("unable to start simulation runner")?;

    let mut reader = DashboardReader::attach(store.clone(), &session.user_id);
    let bill = ensure_bill(&store, &session.user_id)?;
    info!(bill, "billing ready");

    let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = status_interval.tick() => {
                let metrics = reader.metrics();
                info!(
                    tank_level = metrics.tank_level,
                    flow_rate = metrics.flow_rate,
                    motor = metrics.motor_status,
                    leak_alert = metrics.leak_alert,
                    sync = %runner.sync_status(),
                    "dashboard status"
                );
            }
        }
    }

    runner.shutdown().await?;
    reader.detach();
    auth.sign_out();
    Ok(())
}
