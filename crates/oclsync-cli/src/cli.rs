use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oclsync")]
#[command(about = "Inspect and configure Open Concept Lab synchronization")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to an Open Concept Lab source, replacing any previous subscription
    Subscribe {
        /// Source URL, e.g. <https://api.openconceptlab.org/orgs/CIEL/sources/CIEL/>
        #[arg(long, value_name = "URL")]
        url: String,
        /// API token for the source
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Poll interval, days part
        #[arg(long, default_value = "0")]
        days: u32,
        /// Poll interval, hours part
        #[arg(long, default_value = "0")]
        hours: u32,
        /// Poll interval, minutes part
        #[arg(long, default_value = "0")]
        minutes: u32,
        /// Fetch full snapshots instead of incremental releases
        #[arg(long)]
        snapshot: bool,
    },
    /// Show the current subscription
    Subscription {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the subscription
    Unsubscribe,
    /// Inspect the update history
    Updates {
        #[command(subcommand)]
        command: UpdatesCommands,
    },
    /// Close updates left running by a crashed process
    Recover,
}

#[derive(Subcommand)]
pub enum UpdatesCommands {
    /// List updates, most recent first
    List {
        /// Number of updates to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Number of updates to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single update
    Show {
        /// Update ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent successful update
    Last {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
