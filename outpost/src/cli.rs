//! Runs the command line application.
//!
//! Configuration is assembled in increasing precedence: built-in defaults,
//! command line flags, the JSON config file (path from `-c/--config` or
//! `CONFIG`), and environment variables.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ArgMatches;
use tokio::sync::watch;

use outpost_agent::Agent;
use outpost_config::{Config, FileConfig, OverridableConfig};

use crate::cliapp::make_app;
use crate::setup;

pub fn execute() -> Result<()> {
    let matches = make_app().get_matches();
    let (command, sub_matches) = matches
        .subcommand()
        .expect("subcommand is required by the cli definition");

    let mut config = Config::default();
    config
        .apply_override(extract_config_args(sub_matches))
        .context("invalid command line flag")?;

    // The config file path itself follows env-over-flag precedence.
    let config_path = match env::var("CONFIG") {
        Ok(path) if !path.is_empty() => Some(path),
        _ => matches.get_one::<String>("config").cloned(),
    };
    if let Some(path) = config_path {
        config.apply_file(FileConfig::from_path(&path)?);
    }

    config
        .apply_override(extract_config_env_vars())
        .context("invalid environment variable")?;
    config.validate()?;

    outpost_log::init(&config.logging());
    setup::dump_config(command, &config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;

    match command {
        "server" => runtime.block_on(outpost_server::run(config))?,
        "agent" => runtime.block_on(run_agent(config))?,
        _ => unreachable!(),
    }

    Ok(())
}

/// Extract config overrides from parsed command line flags.
fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    let get = |id: &str| -> Option<String> {
        if matches.try_contains_id(id).unwrap_or(false) {
            matches.get_one::<String>(id).cloned()
        } else {
            None
        }
    };

    OverridableConfig {
        address: get("address"),
        grpc_address: get("grpc_address"),
        hash_key: get("hash_key"),
        crypto_key: get("crypto_key"),
        trusted_subnet: get("trusted_subnet"),
        store_interval: get("store_interval"),
        file_path: get("file_path"),
        database_dsn: get("database_dsn"),
        restore: get("restore"),
        poll_interval: get("poll_interval"),
        report_interval: get("report_interval"),
        rate_limit: get("rate_limit"),
        log_level: get("level"),
    }
}

/// Extract config overrides from environment variables.
fn extract_config_env_vars() -> OverridableConfig {
    OverridableConfig {
        address: env::var("ADDRESS").ok(),
        grpc_address: env::var("GRPC_ADDRESS").ok(),
        hash_key: env::var("KEY").ok(),
        crypto_key: env::var("CRYPTO_KEY").ok(),
        trusted_subnet: env::var("TRUSTED_SUBNET").ok(),
        store_interval: env::var("STORE_INTERVAL").ok(),
        file_path: env::var("FILE_STORAGE_PATH").ok(),
        database_dsn: env::var("DATABASE_DSN").ok(),
        restore: env::var("RESTORE").ok(),
        poll_interval: env::var("POLL_INTERVAL").ok(),
        report_interval: env::var("REPORT_INTERVAL").ok(),
        rate_limit: env::var("RATE_LIMIT").ok(),
        log_level: env::var("LOG_LEVEL").ok(),
    }
}

/// Runs the agent until a termination signal arrives.
async fn run_agent(config: Config) -> Result<()> {
    let agent = Agent::new(Arc::new(config))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(agent.run(shutdown_rx));

    setup::wait_for_signal()
        .await
        .context("failed to install signal handler")?;
    outpost_log::info!("received shutdown signal");

    let _ = shutdown_tx.send(true);
    let _ = task.await;
    Ok(())
}
