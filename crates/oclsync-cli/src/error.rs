use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] oclsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid update ID: {0}")]
    InvalidUpdateId(String),
    #[error("No subscription configured. Run `oclsync subscribe --url <URL>` first.")]
    NotSubscribed,
    #[error("Could not resolve a data directory; pass --db-path or set OCLSYNC_DB_PATH")]
    NoDataDir,
}
