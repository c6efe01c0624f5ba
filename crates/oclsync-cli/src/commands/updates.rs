use std::path::Path;

use oclsync_core::db::{LibSqlUpdateRepository, UpdateRepository};
use oclsync_core::UpdateId;

use crate::commands::common::{format_update_lines, open_database, update_to_item, UpdateItem};
use crate::error::CliError;

pub async fn run_list_updates(
    offset: usize,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let updates = LibSqlUpdateRepository::new(db.connection())
        .list(offset, limit)
        .await?;

    if as_json {
        let json_items = updates.iter().map(update_to_item).collect::<Vec<UpdateItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("No updates recorded.");
        return Ok(());
    }

    for line in format_update_lines(&updates) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_show_update(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let id = parse_update_id(id)?;
    let db = open_database(db_path).await?;
    let update = LibSqlUpdateRepository::new(db.connection()).get(id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&update_to_item(&update))?);
    } else {
        for line in format_update_lines(std::slice::from_ref(&update)) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_last_update(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let last = LibSqlUpdateRepository::new(db.connection())
        .last_successful()
        .await?;

    match (last, as_json) {
        (Some(update), true) => {
            println!("{}", serde_json::to_string_pretty(&update_to_item(&update))?);
        }
        (Some(update), false) => {
            for line in format_update_lines(std::slice::from_ref(&update)) {
                println!("{line}");
            }
        }
        (None, true) => println!("null"),
        (None, false) => println!("No successful update yet."),
    }
    Ok(())
}

pub fn parse_update_id(raw: &str) -> Result<UpdateId, CliError> {
    let trimmed = raw.trim().trim_start_matches('#');
    trimmed
        .parse()
        .map_err(|_| CliError::InvalidUpdateId(raw.to_string()))
}
