//! Flat delimited export of persisted records.

use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::models::{Field, PropertyRecord};
use crate::repository::PropertyRepository;

/// Write all records as CSV to `path`. Returns how many rows were written.
pub async fn export_to_file(repo: &PropertyRepository, path: &Path) -> anyhow::Result<usize> {
    let records = repo.list(None).await?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let written = write_csv(&records, &mut file)?;
    Ok(written)
}

/// Write records as CSV: a header row, then one row per record.
pub fn write_csv(records: &[PropertyRecord], out: &mut impl Write) -> anyhow::Result<usize> {
    let mut header: Vec<&str> = vec!["id", "url"];
    header.extend(Field::ALL.iter().map(|f| f.name()));
    header.extend(["costo_metro_cuadrado", "status", "created_at", "scraped_at"]);
    writeln!(out, "{}", header.join(","))?;

    for record in records {
        let mut row: Vec<String> = vec![csv_escape(&record.id), csv_escape(&record.url)];
        for field in Field::ALL {
            row.push(match record.fields.get(field) {
                Some(value) => csv_escape(&value.to_string()),
                None => String::new(),
            });
        }
        row.push(
            record
                .cost_per_area
                .map(|c| format!("{c:.2}"))
                .unwrap_or_default(),
        );
        row.push(record.status.as_str().to_string());
        row.push(record.created_at.to_rfc3339());
        row.push(record.scraped_at.to_rfc3339());
        writeln!(out, "{}", row.join(","))?;
    }

    Ok(records.len())
}

/// Quote a CSV value when it contains a delimiter, quote, or newline.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldMap, FieldValue, ReviewStatus};
    use chrono::Utc;

    fn sample_record() -> PropertyRecord {
        let mut fields = FieldMap::new();
        fields.insert(Field::Precio, FieldValue::Real(120000.0));
        fields.insert(Field::Moneda, FieldValue::Text("USD".into()));
        fields.insert(
            Field::DescripcionBreve,
            FieldValue::Text("Casa con patio, quincho y \"pileta\"".into()),
        );
        PropertyRecord {
            id: "abc".into(),
            url: "https://example.com/1".into(),
            fields,
            cost_per_area: Some(2000.0),
            status: ReviewStatus::Maybe,
            created_at: Utc::now(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let mut buf = Vec::new();
        let written = write_csv(&[sample_record()], &mut buf).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,url,tipo_operacion"));
        assert!(header.ends_with("costo_metro_cuadrado,status,created_at,scraped_at"));

        let row = lines.next().unwrap();
        assert!(row.contains("120000"));
        assert!(row.contains(r#""Casa con patio, quincho y ""pileta""""#));
        assert!(row.contains("2000.00"));
        assert!(row.contains("maybe"));
    }

    #[test]
    fn test_unknown_fields_export_empty() {
        let mut buf = Vec::new();
        write_csv(&[sample_record()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        // tipo_operacion and tipo_inmueble are unknown: empty cells follow the url.
        assert!(row.starts_with("abc,https://example.com/1,,,"));
    }
}
