//! Stats command: record counts and aggregates.

use console::style;

use crate::config::Settings;
use crate::models::ReviewStatus;
use crate::repository::{PropertyRepository, SqlitePool};

pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let repo = PropertyRepository::new(SqlitePool::from_path(&settings.database_path()));
    repo.init_schema().await?;

    let total = repo.count().await?;
    println!("{}", style("DATABASE STATISTICS").bold());
    println!("  Total listings      {total}");

    for (status, count) in repo.status_counts().await? {
        let label = match status {
            ReviewStatus::Unset => "Not reviewed",
            ReviewStatus::Yes => "Interested",
            ReviewStatus::No => "Not interested",
            ReviewStatus::Maybe => "Maybe",
        };
        println!("  {label:<18}  {count}");
    }

    match repo.average_cost_per_area().await? {
        Some(avg) => println!("  Avg cost per m²     {avg:.2}"),
        None => println!("  Avg cost per m²     -"),
    }

    println!();
    println!(
        "{}",
        style(format!("Database: {}", settings.database_path().display())).dim()
    );
    Ok(())
}
