//! Diesel row models for the properties table.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::models::{Field, FieldMap, FieldValue, PropertyRecord, ReviewStatus};
use crate::schema::properties;

/// Property row as read from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = properties)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PropertyRow {
    pub id: String,
    pub url: String,
    pub tipo_operacion: Option<String>,
    pub tipo_inmueble: Option<String>,
    pub direccion: Option<String>,
    pub barrio: Option<String>,
    pub metros_cuadrados_cubiertos: Option<f64>,
    pub metros_cuadrados_totales: Option<f64>,
    pub precio: Option<f64>,
    pub moneda: Option<String>,
    pub cantidad_dormitorios: Option<i32>,
    pub cantidad_banos: Option<i32>,
    pub cantidad_ambientes: Option<i32>,
    pub tiene_patio: Option<bool>,
    pub tiene_quincho: Option<bool>,
    pub tiene_pileta: Option<bool>,
    pub tiene_cochera: Option<bool>,
    pub tiene_balcon: Option<bool>,
    pub tiene_terraza: Option<bool>,
    pub piso: Option<String>,
    pub orientacion: Option<String>,
    pub antiguedad: Option<i32>,
    pub descripcion_breve: Option<String>,
    pub costo_metro_cuadrado: Option<f64>,
    pub status: String,
    pub created_at: String,
    pub scraped_at: String,
}

/// New property row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = properties)]
pub struct NewPropertyRow {
    pub id: String,
    pub url: String,
    pub tipo_operacion: Option<String>,
    pub tipo_inmueble: Option<String>,
    pub direccion: Option<String>,
    pub barrio: Option<String>,
    pub metros_cuadrados_cubiertos: Option<f64>,
    pub metros_cuadrados_totales: Option<f64>,
    pub precio: Option<f64>,
    pub moneda: Option<String>,
    pub cantidad_dormitorios: Option<i32>,
    pub cantidad_banos: Option<i32>,
    pub cantidad_ambientes: Option<i32>,
    pub tiene_patio: Option<bool>,
    pub tiene_quincho: Option<bool>,
    pub tiene_pileta: Option<bool>,
    pub tiene_cochera: Option<bool>,
    pub tiene_balcon: Option<bool>,
    pub tiene_terraza: Option<bool>,
    pub piso: Option<String>,
    pub orientacion: Option<String>,
    pub antiguedad: Option<i32>,
    pub descripcion_breve: Option<String>,
    pub costo_metro_cuadrado: Option<f64>,
    pub status: String,
    pub created_at: String,
    pub scraped_at: String,
}

/// Changeset for a re-scrape: every scraped column is rewritten, including
/// back to NULL when a previously-known value is no longer extractable.
/// `id`, `url`, `status`, and `created_at` are deliberately absent.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = properties)]
#[diesel(treat_none_as_null = true)]
pub struct PropertyChanges {
    pub tipo_operacion: Option<String>,
    pub tipo_inmueble: Option<String>,
    pub direccion: Option<String>,
    pub barrio: Option<String>,
    pub metros_cuadrados_cubiertos: Option<f64>,
    pub metros_cuadrados_totales: Option<f64>,
    pub precio: Option<f64>,
    pub moneda: Option<String>,
    pub cantidad_dormitorios: Option<i32>,
    pub cantidad_banos: Option<i32>,
    pub cantidad_ambientes: Option<i32>,
    pub tiene_patio: Option<bool>,
    pub tiene_quincho: Option<bool>,
    pub tiene_pileta: Option<bool>,
    pub tiene_cochera: Option<bool>,
    pub tiene_balcon: Option<bool>,
    pub tiene_terraza: Option<bool>,
    pub piso: Option<String>,
    pub orientacion: Option<String>,
    pub antiguedad: Option<i32>,
    pub descripcion_breve: Option<String>,
    pub costo_metro_cuadrado: Option<f64>,
    pub scraped_at: String,
}

fn text(fields: &FieldMap, field: Field) -> Option<String> {
    fields
        .get(field)
        .and_then(|v| v.as_text())
        .map(str::to_string)
}

fn real(fields: &FieldMap, field: Field) -> Option<f64> {
    fields.get(field).and_then(|v| v.as_real())
}

fn integer(fields: &FieldMap, field: Field) -> Option<i32> {
    fields.get(field).and_then(|v| v.as_integer()).map(|n| n as i32)
}

fn boolean(fields: &FieldMap, field: Field) -> Option<bool> {
    fields.get(field).and_then(|v| v.as_bool())
}

impl PropertyChanges {
    pub fn from_fields(fields: &FieldMap, cost_per_area: Option<f64>, scraped_at: &DateTime<Utc>) -> Self {
        Self {
            tipo_operacion: text(fields, Field::TipoOperacion),
            tipo_inmueble: text(fields, Field::TipoInmueble),
            direccion: text(fields, Field::Direccion),
            barrio: text(fields, Field::Barrio),
            metros_cuadrados_cubiertos: real(fields, Field::MetrosCuadradosCubiertos),
            metros_cuadrados_totales: real(fields, Field::MetrosCuadradosTotales),
            precio: real(fields, Field::Precio),
            moneda: text(fields, Field::Moneda),
            cantidad_dormitorios: integer(fields, Field::CantidadDormitorios),
            cantidad_banos: integer(fields, Field::CantidadBanos),
            cantidad_ambientes: integer(fields, Field::CantidadAmbientes),
            tiene_patio: boolean(fields, Field::TienePatio),
            tiene_quincho: boolean(fields, Field::TieneQuincho),
            tiene_pileta: boolean(fields, Field::TienePileta),
            tiene_cochera: boolean(fields, Field::TieneCochera),
            tiene_balcon: boolean(fields, Field::TieneBalcon),
            tiene_terraza: boolean(fields, Field::TieneTerraza),
            piso: text(fields, Field::Piso),
            orientacion: text(fields, Field::Orientacion),
            antiguedad: integer(fields, Field::Antiguedad),
            descripcion_breve: text(fields, Field::DescripcionBreve),
            costo_metro_cuadrado: cost_per_area,
            scraped_at: scraped_at.to_rfc3339(),
        }
    }
}

impl NewPropertyRow {
    pub fn from_fields(
        id: String,
        url: String,
        fields: &FieldMap,
        cost_per_area: Option<f64>,
        now: &DateTime<Utc>,
    ) -> Self {
        let changes = PropertyChanges::from_fields(fields, cost_per_area, now);
        Self {
            id,
            url,
            tipo_operacion: changes.tipo_operacion,
            tipo_inmueble: changes.tipo_inmueble,
            direccion: changes.direccion,
            barrio: changes.barrio,
            metros_cuadrados_cubiertos: changes.metros_cuadrados_cubiertos,
            metros_cuadrados_totales: changes.metros_cuadrados_totales,
            precio: changes.precio,
            moneda: changes.moneda,
            cantidad_dormitorios: changes.cantidad_dormitorios,
            cantidad_banos: changes.cantidad_banos,
            cantidad_ambientes: changes.cantidad_ambientes,
            tiene_patio: changes.tiene_patio,
            tiene_quincho: changes.tiene_quincho,
            tiene_pileta: changes.tiene_pileta,
            tiene_cochera: changes.tiene_cochera,
            tiene_balcon: changes.tiene_balcon,
            tiene_terraza: changes.tiene_terraza,
            piso: changes.piso,
            orientacion: changes.orientacion,
            antiguedad: changes.antiguedad,
            descripcion_breve: changes.descripcion_breve,
            costo_metro_cuadrado: cost_per_area,
            status: ReviewStatus::Unset.as_str().to_string(),
            created_at: now.to_rfc3339(),
            scraped_at: now.to_rfc3339(),
        }
    }
}

impl PropertyRow {
    /// Convert a database row into the domain record.
    pub fn into_record(self) -> PropertyRecord {
        let mut fields = FieldMap::new();
        let mut put_text = |field: Field, value: Option<String>| {
            if let Some(v) = value {
                fields.insert(field, FieldValue::Text(v));
            }
        };
        put_text(Field::TipoOperacion, self.tipo_operacion);
        put_text(Field::TipoInmueble, self.tipo_inmueble);
        put_text(Field::Direccion, self.direccion);
        put_text(Field::Barrio, self.barrio);
        put_text(Field::Moneda, self.moneda);
        put_text(Field::Piso, self.piso);
        put_text(Field::Orientacion, self.orientacion);
        put_text(Field::DescripcionBreve, self.descripcion_breve);

        let reals = [
            (Field::MetrosCuadradosCubiertos, self.metros_cuadrados_cubiertos),
            (Field::MetrosCuadradosTotales, self.metros_cuadrados_totales),
            (Field::Precio, self.precio),
        ];
        for (field, value) in reals {
            if let Some(v) = value {
                fields.insert(field, FieldValue::Real(v));
            }
        }

        let integers = [
            (Field::CantidadDormitorios, self.cantidad_dormitorios),
            (Field::CantidadBanos, self.cantidad_banos),
            (Field::CantidadAmbientes, self.cantidad_ambientes),
            (Field::Antiguedad, self.antiguedad),
        ];
        for (field, value) in integers {
            if let Some(v) = value {
                fields.insert(field, FieldValue::Integer(v as i64));
            }
        }

        let bools = [
            (Field::TienePatio, self.tiene_patio),
            (Field::TieneQuincho, self.tiene_quincho),
            (Field::TienePileta, self.tiene_pileta),
            (Field::TieneCochera, self.tiene_cochera),
            (Field::TieneBalcon, self.tiene_balcon),
            (Field::TieneTerraza, self.tiene_terraza),
        ];
        for (field, value) in bools {
            if let Some(v) = value {
                fields.insert(field, FieldValue::Bool(v));
            }
        }

        PropertyRecord {
            id: self.id,
            url: self.url,
            fields,
            cost_per_area: self.costo_metro_cuadrado,
            status: ReviewStatus::from_str(&self.status).unwrap_or_default(),
            created_at: parse_datetime(&self.created_at),
            scraped_at: parse_datetime(&self.scraped_at),
        }
    }
}

/// Parse an RFC 3339 timestamp column, falling back to the epoch for rows
/// written by hand or by older tooling.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
