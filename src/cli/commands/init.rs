//! Init command: create the data directory, skeleton files, and schema.

use console::style;
use serde_json::json;

use crate::config::Settings;
use crate::models::Field;
use crate::repository::{PropertyRepository, SqlitePool};
use crate::status::LEDGER_HEADER;

const INBOX_HEADER: &str = "# Links to scrape\n# One listing URL per line; scraped URLs move to the review ledger.\n";

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;
    println!(
        "{} Data directory: {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    let sites_path = settings.sites_path();
    if sites_path.exists() {
        println!(
            "{} Site config already exists: {}",
            style("→").cyan(),
            sites_path.display()
        );
    } else {
        std::fs::write(&sites_path, example_sites_json())?;
        println!(
            "{} Wrote example site config: {}",
            style("✓").green(),
            sites_path.display()
        );
    }

    let ledger_path = settings.ledger_path();
    if !ledger_path.exists() {
        std::fs::write(&ledger_path, LEDGER_HEADER)?;
        println!(
            "{} Created review ledger: {}",
            style("✓").green(),
            ledger_path.display()
        );
    }

    let inbox_path = settings.inbox_path();
    if !inbox_path.exists() {
        std::fs::write(&inbox_path, INBOX_HEADER)?;
        println!(
            "{} Created inbox: {}",
            style("✓").green(),
            inbox_path.display()
        );
    }

    let repo = PropertyRepository::new(SqlitePool::from_path(&settings.database_path()));
    repo.init_schema().await?;
    println!(
        "{} Database ready: {}",
        style("✓").green(),
        settings.database_path().display()
    );

    Ok(())
}

/// A working starter config: price and currency via patterns, the rest via
/// the completion backend. The full field partition is mandatory, so the
/// example spells it out.
fn example_sites_json() -> String {
    let structured = ["precio", "moneda"];
    let llm: Vec<&str> = Field::ALL
        .iter()
        .map(|f| f.name())
        .filter(|name| !structured.contains(name))
        .collect();

    let config = json!({
        "_comment": "One entry per listing site domain. structured_fields and llm_fields must cover all 21 fields.",
        "zonaprop.com.ar": {
            "name": "Zonaprop",
            "structured_fields": structured,
            "llm_fields": llm,
            "patterns": {
                "precio": {"kind": "regex", "expression": "(?:USD|ARS)\\s*([\\d.,]+)"},
                "moneda": {"kind": "regex", "expression": "(USD|ARS)"}
            }
        }
    });
    serde_json::to_string_pretty(&config).expect("static example serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteRegistry;

    #[test]
    fn test_example_config_passes_validation() {
        let registry = SiteRegistry::from_json(&example_sites_json()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry
            .resolve("https://www.zonaprop.com.ar/propiedades/clasificado/123.html")
            .is_ok());
    }
}
