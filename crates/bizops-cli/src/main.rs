//! Bizops CLI
//!
//! Command-line interface for Bizops user and role administration.

#![warn(clippy::all)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use bizops_acl::{Acl, JsonFileStore};
use bizops_cli::cli::{Cli, Command};
use bizops_cli::commands::{self, Context, Outcome};
use bizops_cli::config_handlers::handle_config_command;
use bizops_core::BizopsConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn,bizops=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut stdout = std::io::stdout().lock();

    if let Command::Config { action } = cli.command {
        handle_config_command(cli.config.as_deref(), action, &mut stdout)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = BizopsConfig::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.store.path = state;
    }

    let store = JsonFileStore::open(&config.store.path)
        .await
        .with_context(|| format!("opening state file {}", config.store.path.display()))?;
    tracing::debug!(path = %config.store.path.display(), "state file opened");

    let acl = Acl::from_config(store, &config)?;
    let acl = commands::acting_as(&acl, cli.actor.as_deref()).await?;
    let ctx = Context {
        acl,
        config,
        json: cli.json,
    };

    match commands::run(&ctx, cli.command, &mut stdout).await? {
        Outcome::Success => Ok(ExitCode::SUCCESS),
        Outcome::Refused => Ok(ExitCode::FAILURE),
    }
}
