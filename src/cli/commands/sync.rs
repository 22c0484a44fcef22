//! Sync command: push ledger statuses into the database without scraping.

use console::style;

use crate::config::Settings;
use crate::repository::{PropertyRepository, SqlitePool};
use crate::status::StatusReconciler;

pub async fn cmd_sync(settings: &Settings) -> anyhow::Result<()> {
    let repo = PropertyRepository::new(SqlitePool::from_path(&settings.database_path()));
    repo.init_schema().await?;

    let reconciler = StatusReconciler::new(settings.ledger_path(), settings.inbox_path());
    let report = reconciler.sync(&repo).await?;

    println!(
        "{} Synced {} status change{} ({} ledger entries without a record)",
        style("✓").green(),
        report.updated,
        if report.updated == 1 { "" } else { "s" },
        report.skipped
    );
    Ok(())
}
