use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use super::commands::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    let LoadedConfig {
        mut config,
        path,
        found,
    } = load_config(cli.config.as_ref()).await?;
    config.apply_env_overrides();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = init_logging(
        &level,
        cli.debug,
        cli.json_logs || config.logging.json,
        config.logging.directory.as_deref(),
        &config.logging.file_prefix,
    )?;

    info!("Starting plate-renewal v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!("Loaded configuration from: {}", path.display());
    } else {
        info!("Config file not found, using defaults: {}", path.display());
    }
    config.validate().context("invalid configuration")?;

    match dispatch(&cli.command, config).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
