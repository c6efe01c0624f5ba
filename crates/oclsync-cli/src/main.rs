//! oclsync CLI - Administer Open Concept Lab synchronization from the terminal
//!
//! Manages the subscription and inspects the update ledger of a local store.

mod cli;
mod commands;
mod error;

use clap::Parser;
use oclsync_core::updater::recover_abandoned_runs;
use oclsync_core::{EngineConfig, Subscription};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, UpdatesCommands};
use crate::commands::common::{open_database, resolve_db_path};
use crate::commands::recover::run_recover;
use crate::commands::subscription::{run_show_subscription, run_subscribe, run_unsubscribe};
use crate::commands::updates::{run_last_update, run_list_updates, run_show_update};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oclsync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;
    let db_path = resolve_db_path(cli.db_path, &config)?;

    if matches!(cli.command, Commands::Recover) {
        return run_recover(&config, &db_path).await;
    }

    let db = open_database(&db_path).await?;
    let abandoned = recover_abandoned_runs(&db, &config).await?;
    if !abandoned.is_empty() {
        tracing::info!("Closed {} abandoned update(s) on startup", abandoned.len());
    }
    drop(db);

    match cli.command {
        Commands::Subscribe {
            url,
            token,
            days,
            hours,
            minutes,
            snapshot,
        } => {
            let mut subscription = Subscription::new(url)
                .with_interval(days, hours, minutes)
                .with_snapshot_updates(snapshot);
            if let Some(token) = token {
                subscription = subscription.with_token(token);
            }
            run_subscribe(subscription, &db_path).await?;
        }
        Commands::Subscription { json } => run_show_subscription(json, &db_path).await?,
        Commands::Unsubscribe => run_unsubscribe(&db_path).await?,
        Commands::Updates { command } => match command {
            UpdatesCommands::List {
                offset,
                limit,
                json,
            } => run_list_updates(offset, limit, json, &db_path).await?,
            UpdatesCommands::Show { id, json } => run_show_update(&id, json, &db_path).await?,
            UpdatesCommands::Last { json } => run_last_update(json, &db_path).await?,
        },
        Commands::Recover => run_recover(&config, &db_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
