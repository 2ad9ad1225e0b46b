//! Globes command-line client
//!
//! Drives the travel backend from a terminal:
//! 1. Parses `globes [--config PATH] <command> [args]`
//! 2. Loads `globes.toml` (or defaults) and the credential file
//! 3. Runs the command through `TravelApi`, refreshing the session as needed
//! 4. Prints the result as JSON on stdout

mod command;
mod config;
mod error;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use auth_store::FileCredentialStore;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_api::TravelApi;

use crate::command::{Command, USAGE};
use crate::config::Config;

/// Exit status for an expired session.
const EXIT_SESSION_EXPIRED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", report(&err));
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(args: &[String]) -> Result<()> {
    let invocation = command::parse(args)?;
    if invocation.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let explicit = invocation.config_path.is_some() || std::env::var("CONFIG_PATH").is_ok();
    let path = Config::resolve_path(invocation.config_path.as_deref());
    let config = load_config(&path, explicit)?;

    let store = FileCredentialStore::load(config.storage.credentials_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential file {}",
                config.storage.credentials_path.display()
            )
        })?;
    let api = TravelApi::new(&config.settings(), Arc::new(store))
        .context("failed to build API client")?;

    debug!(command = ?invocation.command, "running command");
    let output = command::execute(&api, invocation.command).await?;
    let text = match output {
        serde_json::Value::String(s) => s,
        other => serde_json::to_string_pretty(&other)?,
    };
    println!("{text}");
    Ok(())
}

/// Load the config file. A missing default file means "use defaults";
/// a missing file the user named is an error.
fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return Config::parse("").context("invalid default configuration");
    }
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<travel_api::Error>() {
        Some(e) if e.is_auth_expired() => EXIT_SESSION_EXPIRED,
        _ => 1,
    }
}

fn report(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<travel_api::Error>()
        && e.is_auth_expired()
    {
        return "session expired, run `globes login`".to_string();
    }
    if err.downcast_ref::<error::Error>().is_some() {
        return format!("error: {err}\n\n{USAGE}");
    }
    format!("error: {err:#}")
}
