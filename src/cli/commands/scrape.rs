//! Scrape command: run the full pipeline over the inbox.

use console::style;

use crate::config::Settings;
use crate::services::{Pipeline, RunOptions, RunSummary};

/// Scrape every URL in the inbox and reconcile the ledger.
pub async fn cmd_scrape(
    settings: &Settings,
    skip_existing: bool,
    workers: usize,
    limit: usize,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings)?;

    let summary = pipeline
        .run(RunOptions {
            skip_existing,
            workers,
            limit,
        })
        .await?;

    if summary.total == 0 {
        println!(
            "{} No URLs in inbox ({})",
            style("→").cyan(),
            settings.inbox_path().display()
        );
        println!("Add listing URLs there, one per line, then re-run.");
        return Ok(());
    }

    print_summary(&summary, settings);

    if !summary.is_clean() {
        // Successful URLs are already committed; the failure only shows in
        // the exit code.
        anyhow::bail!("{} of {} URLs failed", summary.failed.len(), summary.total);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, settings: &Settings) {
    println!();
    println!("{}", style("SUMMARY").bold());
    println!("  Total URLs          {}", summary.total);
    println!(
        "  New listings        {}",
        style(summary.created).green()
    );
    println!(
        "  Updated listings    {}",
        style(summary.updated).blue()
    );
    println!(
        "  Skipped             {}",
        style(summary.skipped).yellow()
    );
    println!(
        "  Failed              {}",
        if summary.failed.is_empty() {
            style(0).green()
        } else {
            style(summary.failed.len()).red()
        }
    );
    if summary.interrupted > 0 {
        println!(
            "  Not started         {} (interrupted)",
            style(summary.interrupted).yellow()
        );
    }
    if summary.status_synced > 0 {
        println!("  Statuses synced     {}", summary.status_synced);
    }
    if summary.absorbed > 0 {
        println!("  Moved to ledger     {}", summary.absorbed);
    }

    for failure in &summary.failed {
        println!(
            "  {} {} [{}] {}",
            style("✗").red(),
            failure.url,
            failure.kind,
            failure.reason
        );
    }

    println!();
    println!(
        "{}",
        style(format!("Database: {}", settings.database_path().display())).dim()
    );
}
