//! List command: tabular view of persisted listings.

use console::style;

use crate::config::Settings;
use crate::models::{Field, PropertyRecord, ReviewStatus};
use crate::repository::{PropertyRepository, SqlitePool};

pub async fn cmd_list(settings: &Settings, status: Option<ReviewStatus>) -> anyhow::Result<()> {
    let repo = PropertyRepository::new(SqlitePool::from_path(&settings.database_path()));
    repo.init_schema().await?;

    let records = repo.list(status).await?;
    if records.is_empty() {
        println!("{} No listings found", style("→").cyan());
        return Ok(());
    }

    for record in &records {
        print_record(record);
    }
    println!();
    println!(
        "{}",
        style(format!("{} listing(s)", records.len())).dim()
    );
    Ok(())
}

fn print_record(record: &PropertyRecord) {
    let tag = match record.status {
        ReviewStatus::Yes => style(record.status.to_tag()).green(),
        ReviewStatus::No => style(record.status.to_tag()).red(),
        ReviewStatus::Maybe => style(record.status.to_tag()).yellow(),
        ReviewStatus::Unset => style(record.status.to_tag()).dim(),
    };

    let price = match (
        record.fields.get(Field::Moneda),
        record.fields.get(Field::Precio),
    ) {
        (Some(currency), Some(price)) => format!("{currency} {price}"),
        (None, Some(price)) => price.to_string(),
        _ => "-".to_string(),
    };
    let area = record
        .fields
        .get(Field::MetrosCuadradosTotales)
        .map(|v| format!("{v} m²"))
        .unwrap_or_else(|| "-".to_string());
    let cost = record
        .cost_per_area
        .map(|c| format!("{c:.0}/m²"))
        .unwrap_or_else(|| "-".to_string());
    let barrio = record
        .fields
        .get(Field::Barrio)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{:<8} {:<14} {:<10} {:<10} {:<16} {}",
        tag,
        price,
        area,
        cost,
        barrio,
        style(&record.url).dim()
    );
}
