//! Idempotent property store keyed by listing URL.

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{NewPropertyRow, PropertyChanges, PropertyRow};
use super::pool::{DieselError, SqlitePool};
use crate::models::{Field, FieldMap, PropertyRecord, ReviewStatus};
use crate::schema::properties::dsl as p;

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// A record already existed and skip-existing mode was on; nothing was
    /// touched.
    Skipped,
}

/// Derive the cost per square meter for a merged field map.
///
/// NULL when price or total area is unknown, or the area is zero: a missing
/// derivation and a zero are different signals.
pub fn cost_per_area(fields: &FieldMap) -> Option<f64> {
    let precio = fields.get(Field::Precio)?.as_real()?;
    let area = fields.get(Field::MetrosCuadradosTotales)?.as_real()?;
    if area == 0.0 {
        return None;
    }
    Some(precio / area)
}

/// Repository for persisted property records.
#[derive(Clone)]
pub struct PropertyRepository {
    pool: SqlitePool,
}

impl PropertyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the properties table if it doesn't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY NOT NULL,
                url TEXT NOT NULL UNIQUE,
                tipo_operacion TEXT,
                tipo_inmueble TEXT,
                direccion TEXT,
                barrio TEXT,
                metros_cuadrados_cubiertos REAL,
                metros_cuadrados_totales REAL,
                precio REAL,
                moneda TEXT,
                cantidad_dormitorios INTEGER,
                cantidad_banos INTEGER,
                cantidad_ambientes INTEGER,
                tiene_patio INTEGER,
                tiene_quincho INTEGER,
                tiene_pileta INTEGER,
                tiene_cochera INTEGER,
                tiene_balcon INTEGER,
                tiene_terraza INTEGER,
                piso TEXT,
                orientacion TEXT,
                antiguedad INTEGER,
                descripcion_breve TEXT,
                costo_metro_cuadrado REAL,
                status TEXT NOT NULL DEFAULT 'unset',
                created_at TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_properties_status ON properties(status);
            "#,
        )
        .await?;
        info!("Properties table created/verified");
        Ok(())
    }

    /// Insert or update the record for a URL with a fully merged field map.
    ///
    /// On insert the record gets a fresh durable id, `status = unset`, and
    /// both timestamps. On update every scraped column and `scraped_at` are
    /// rewritten while `id`, `created_at`, and `status` stay untouched.
    /// `costo_metro_cuadrado` is recomputed either way.
    pub async fn upsert(
        &self,
        url: &str,
        fields: &FieldMap,
        skip_existing: bool,
    ) -> Result<UpsertOutcome, DieselError> {
        let mut conn = self.pool.get().await?;

        let existing: Option<String> = p::properties
            .filter(p::url.eq(url))
            .select(p::id)
            .first(&mut conn)
            .await
            .optional()?;

        if existing.is_some() && skip_existing {
            debug!(url, "record exists, skipping");
            return Ok(UpsertOutcome::Skipped);
        }

        let now = Utc::now();
        let cost = cost_per_area(fields);

        if existing.is_some() {
            let changes = PropertyChanges::from_fields(fields, cost, &now);
            diesel::update(p::properties.filter(p::url.eq(url)))
                .set(&changes)
                .execute(&mut conn)
                .await?;
            return Ok(UpsertOutcome::Updated);
        }

        let row = NewPropertyRow::from_fields(
            Uuid::new_v4().to_string(),
            url.to_string(),
            fields,
            cost,
            &now,
        );
        match diesel::insert_into(p::properties)
            .values(&row)
            .execute(&mut conn)
            .await
        {
            Ok(_) => Ok(UpsertOutcome::Created),
            // Lost an insert race on the unique url; fall back to update so
            // repeated upserts can never produce a second row.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                let changes = PropertyChanges::from_fields(fields, cost, &now);
                diesel::update(p::properties.filter(p::url.eq(url)))
                    .set(&changes)
                    .execute(&mut conn)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a record by its listing URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<PropertyRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let row: Option<PropertyRow> = p::properties
            .filter(p::url.eq(url))
            .select(PropertyRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(PropertyRow::into_record))
    }

    /// Set the review status for a URL.
    ///
    /// Returns true when a row actually changed; a URL with no record is a
    /// no-op (the listing may simply not be scraped yet).
    pub async fn set_status(&self, url: &str, status: ReviewStatus) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let changed = diesel::update(
            p::properties.filter(p::url.eq(url).and(p::status.ne(status.as_str()))),
        )
        .set(p::status.eq(status.as_str()))
        .execute(&mut conn)
        .await?;
        Ok(changed > 0)
    }

    /// List records, optionally filtered by review status, newest scrape
    /// first.
    pub async fn list(
        &self,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<PropertyRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let mut query = p::properties
            .select(PropertyRow::as_select())
            .order(p::scraped_at.desc())
            .into_boxed();
        if let Some(s) = status {
            query = query.filter(p::status.eq(s.as_str()));
        }
        let rows: Vec<PropertyRow> = query.load(&mut conn).await?;
        Ok(rows.into_iter().map(PropertyRow::into_record).collect())
    }

    /// Count all records.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;
        let count: i64 = p::properties.count().first(&mut conn).await?;
        Ok(count as u64)
    }

    /// Record counts per review status.
    pub async fn status_counts(&self) -> Result<Vec<(ReviewStatus, u64)>, DieselError> {
        let mut conn = self.pool.get().await?;
        let statuses: Vec<String> = p::properties.select(p::status).load(&mut conn).await?;

        let mut counts = [0u64; 4];
        for s in statuses {
            if let Some(status) = ReviewStatus::from_str(&s) {
                let idx = match status {
                    ReviewStatus::Unset => 0,
                    ReviewStatus::Yes => 1,
                    ReviewStatus::No => 2,
                    ReviewStatus::Maybe => 3,
                };
                counts[idx] += 1;
            }
        }
        Ok(vec![
            (ReviewStatus::Unset, counts[0]),
            (ReviewStatus::Yes, counts[1]),
            (ReviewStatus::No, counts[2]),
            (ReviewStatus::Maybe, counts[3]),
        ])
    }

    /// Mean derived cost per m² over records that have one.
    pub async fn average_cost_per_area(&self) -> Result<Option<f64>, DieselError> {
        let mut conn = self.pool.get().await?;
        let costs: Vec<Option<f64>> = p::properties
            .select(p::costo_metro_cuadrado)
            .load(&mut conn)
            .await?;
        let known: Vec<f64> = costs.into_iter().flatten().collect();
        if known.is_empty() {
            return Ok(None);
        }
        Ok(Some(known.iter().sum::<f64>() / known.len() as f64))
    }
}
