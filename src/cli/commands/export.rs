//! Export command: dump all listings to CSV.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::repository::{PropertyRepository, SqlitePool};
use crate::services::export::export_to_file;

pub async fn cmd_export(settings: &Settings, output: &Path) -> anyhow::Result<()> {
    let repo = PropertyRepository::new(SqlitePool::from_path(&settings.database_path()));
    repo.init_schema().await?;

    let written = export_to_file(&repo, output).await?;
    if written == 0 {
        println!("{} No listings to export", style("→").cyan());
    } else {
        println!(
            "{} Exported {} listing{} to {}",
            style("✓").green(),
            written,
            if written == 1 { "" } else { "s" },
            style(output.display()).bold()
        );
    }
    Ok(())
}
