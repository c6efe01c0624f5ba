use std::path::Path;

use oclsync_core::updater::recover_abandoned_runs;
use oclsync_core::EngineConfig;

use crate::commands::common::{format_update_lines, open_database};
use crate::error::CliError;

pub async fn run_recover(config: &EngineConfig, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let abandoned = recover_abandoned_runs(&db, config).await?;

    if abandoned.is_empty() {
        println!("No abandoned updates.");
        return Ok(());
    }

    println!("Closed {} abandoned update(s):", abandoned.len());
    for line in format_update_lines(&abandoned) {
        println!("{line}");
    }
    Ok(())
}
