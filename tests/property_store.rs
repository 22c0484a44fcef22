//! Record store and ledger reconciliation tests.
//!
//! Exercises the idempotent upsert contract and the ledger/store sync
//! against a real SQLite file.

use propacquire::models::{Field, FieldMap, FieldValue, ReviewStatus};
use propacquire::repository::{PropertyRepository, SqlitePool, UpsertOutcome};
use propacquire::status::StatusReconciler;
use tempfile::TempDir;

async fn test_repo(dir: &TempDir) -> PropertyRepository {
    let db_path = dir.path().join("test.db");
    let repo = PropertyRepository::new(SqlitePool::from_path(&db_path));
    repo.init_schema().await.unwrap();
    repo
}

fn listing_fields(precio: f64, area: f64) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert(Field::Precio, FieldValue::Real(precio));
    fields.insert(Field::MetrosCuadradosTotales, FieldValue::Real(area));
    fields.insert(Field::Moneda, FieldValue::Text("USD".into()));
    fields.insert(Field::TipoOperacion, FieldValue::Text("venta".into()));
    fields
}

#[tokio::test]
async fn test_upsert_creates_then_updates_same_row() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/1";

    let outcome = repo
        .upsert(url, &listing_fields(100000.0, 50.0), false)
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let first = repo.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(first.cost_per_area, Some(2000.0));
    assert_eq!(first.status, ReviewStatus::Unset);

    let outcome = repo
        .upsert(url, &listing_fields(110000.0, 50.0), false)
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let second = repo.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.cost_per_area, Some(2200.0));
    assert!(second.scraped_at >= first.scraped_at);
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_upsert_is_idempotent_under_identical_input() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/2";
    let fields = listing_fields(95000.0, 80.0);

    repo.upsert(url, &fields, false).await.unwrap();
    let first = repo.get_by_url(url).await.unwrap().unwrap();

    repo.upsert(url, &fields, false).await.unwrap();
    let second = repo.get_by_url(url).await.unwrap().unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.fields, first.fields);
}

#[tokio::test]
async fn test_upsert_never_touches_review_status() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/3";

    repo.upsert(url, &listing_fields(100000.0, 50.0), false)
        .await
        .unwrap();
    assert!(repo.set_status(url, ReviewStatus::Yes).await.unwrap());

    repo.upsert(url, &listing_fields(120000.0, 50.0), false)
        .await
        .unwrap();
    let record = repo.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(record.status, ReviewStatus::Yes);
}

#[tokio::test]
async fn test_skip_existing_leaves_record_untouched() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/4";

    repo.upsert(url, &listing_fields(100000.0, 50.0), false)
        .await
        .unwrap();
    let before = repo.get_by_url(url).await.unwrap().unwrap();

    let outcome = repo
        .upsert(url, &listing_fields(999999.0, 1.0), true)
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Skipped);

    let after = repo.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(after.fields, before.fields);
    assert_eq!(after.scraped_at, before.scraped_at);
}

#[tokio::test]
async fn test_update_clears_no_longer_extractable_fields() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/5";

    let mut rich = listing_fields(100000.0, 50.0);
    rich.insert(Field::Barrio, FieldValue::Text("Alberdi".into()));
    repo.upsert(url, &rich, false).await.unwrap();

    let mut poor = FieldMap::new();
    poor.insert(Field::Precio, FieldValue::Real(100000.0));
    repo.upsert(url, &poor, false).await.unwrap();

    let record = repo.get_by_url(url).await.unwrap().unwrap();
    assert!(record.fields.get(Field::Barrio).is_none());
    // Area disappeared, so the derivation must go back to unknown.
    assert_eq!(record.cost_per_area, None);
}

#[tokio::test]
async fn test_ledger_sync_without_record_is_noop() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;

    let ledger_path = dir.path().join("properties-status.md");
    std::fs::write(&ledger_path, "[YES] https://a.example/unscraped\n").unwrap();
    let reconciler = StatusReconciler::new(ledger_path, dir.path().join("links-to-scrap.md"));

    let report = reconciler.sync(&repo).await.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn test_ledger_sync_applies_and_settles() {
    let dir = TempDir::new().unwrap();
    let repo = test_repo(&dir).await;
    let url = "https://example.com/prop/6";
    repo.upsert(url, &listing_fields(80000.0, 40.0), false)
        .await
        .unwrap();

    let ledger_path = dir.path().join("properties-status.md");
    std::fs::write(&ledger_path, format!("[MAYBE] {url}\n")).unwrap();
    let reconciler = StatusReconciler::new(ledger_path, dir.path().join("links-to-scrap.md"));

    let report = reconciler.sync(&repo).await.unwrap();
    assert_eq!(report.updated, 1);
    let record = repo.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(record.status, ReviewStatus::Maybe);

    // A second sync with no edits changes nothing.
    let report = reconciler.sync(&repo).await.unwrap();
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn test_schema_enforces_url_uniqueness() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    {
        let repo = PropertyRepository::new(SqlitePool::from_path(&db_path));
        repo.init_schema().await.unwrap();
    }

    // Inspect the created schema directly.
    let conn = rusqlite::Connection::open(&db_path).unwrap();

    let mut stmt = conn
        .prepare("SELECT sql FROM sqlite_master WHERE type='table' AND name='properties'")
        .unwrap();
    let create_sql: String = stmt.query_row([], |row| row.get(0)).unwrap();
    assert!(create_sql.contains("url TEXT NOT NULL UNIQUE"));
    assert!(create_sql.contains("status TEXT NOT NULL DEFAULT 'unset'"));

    // Belt and braces: a raw duplicate insert must fail.
    conn.execute(
        "INSERT INTO properties (id, url, created_at, scraped_at) VALUES ('a', 'https://x', '', '')",
        [],
    )
    .unwrap();
    let dup = conn.execute(
        "INSERT INTO properties (id, url, created_at, scraped_at) VALUES ('b', 'https://x', '', '')",
        [],
    );
    assert!(dup.is_err());
}
