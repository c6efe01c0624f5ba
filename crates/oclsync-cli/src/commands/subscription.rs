use std::path::Path;

use oclsync_core::db::{LibSqlSubscriptionRepository, SubscriptionRepository};
use oclsync_core::Subscription;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_subscribe(subscription: Subscription, db_path: &Path) -> Result<(), CliError> {
    let subscription = subscription.normalized()?;
    let db = open_database(db_path).await?;
    LibSqlSubscriptionRepository::new(db.connection())
        .save(&subscription)
        .await?;

    println!("Subscribed to {}", subscription.url);
    Ok(())
}

pub async fn run_show_subscription(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let subscription = LibSqlSubscriptionRepository::new(db.connection())
        .load()
        .await?
        .ok_or(CliError::NotSubscribed)?;

    if as_json {
        let mut redacted = subscription;
        redacted.token = redacted.token.map(|_| "[REDACTED]".to_string());
        println!("{}", serde_json::to_string_pretty(&redacted)?);
        return Ok(());
    }

    for line in format_subscription_lines(&subscription) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_unsubscribe(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    LibSqlSubscriptionRepository::new(db.connection())
        .remove()
        .await?;
    println!("Subscription removed");
    Ok(())
}

pub fn format_subscription_lines(subscription: &Subscription) -> Vec<String> {
    let interval = subscription.poll_interval().map_or_else(
        || "manual".to_string(),
        |_| {
            format!(
                "every {}d {}h {}m",
                subscription.days, subscription.hours, subscription.minutes
            )
        },
    );
    let mode = if subscription.fetch_snapshot_updates {
        "snapshot"
    } else {
        "release"
    };

    vec![
        format!("URL:      {}", subscription.url),
        format!(
            "Token:    {}",
            if subscription.token.is_some() {
                "set"
            } else {
                "not set"
            }
        ),
        format!("Interval: {interval}"),
        format!("Mode:     {mode}"),
    ]
}
