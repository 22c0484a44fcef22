//! The fixed field schema for property listings.
//!
//! Every listing is described by the same 21 fields. Keeping them as a closed
//! enum means site configs, extraction results, and database columns are all
//! checked against one schema instead of loose strings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Bool,
}

/// One of the 21 listing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    TipoOperacion,
    TipoInmueble,
    Direccion,
    Barrio,
    MetrosCuadradosCubiertos,
    MetrosCuadradosTotales,
    Precio,
    Moneda,
    CantidadDormitorios,
    CantidadBanos,
    CantidadAmbientes,
    TienePatio,
    TieneQuincho,
    TienePileta,
    TieneCochera,
    TieneBalcon,
    TieneTerraza,
    Piso,
    Orientacion,
    Antiguedad,
    DescripcionBreve,
}

impl Field {
    /// All fields, in schema order.
    pub const ALL: [Field; 21] = [
        Field::TipoOperacion,
        Field::TipoInmueble,
        Field::Direccion,
        Field::Barrio,
        Field::MetrosCuadradosCubiertos,
        Field::MetrosCuadradosTotales,
        Field::Precio,
        Field::Moneda,
        Field::CantidadDormitorios,
        Field::CantidadBanos,
        Field::CantidadAmbientes,
        Field::TienePatio,
        Field::TieneQuincho,
        Field::TienePileta,
        Field::TieneCochera,
        Field::TieneBalcon,
        Field::TieneTerraza,
        Field::Piso,
        Field::Orientacion,
        Field::Antiguedad,
        Field::DescripcionBreve,
    ];

    /// Wire/column name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::TipoOperacion => "tipo_operacion",
            Field::TipoInmueble => "tipo_inmueble",
            Field::Direccion => "direccion",
            Field::Barrio => "barrio",
            Field::MetrosCuadradosCubiertos => "metros_cuadrados_cubiertos",
            Field::MetrosCuadradosTotales => "metros_cuadrados_totales",
            Field::Precio => "precio",
            Field::Moneda => "moneda",
            Field::CantidadDormitorios => "cantidad_dormitorios",
            Field::CantidadBanos => "cantidad_banos",
            Field::CantidadAmbientes => "cantidad_ambientes",
            Field::TienePatio => "tiene_patio",
            Field::TieneQuincho => "tiene_quincho",
            Field::TienePileta => "tiene_pileta",
            Field::TieneCochera => "tiene_cochera",
            Field::TieneBalcon => "tiene_balcon",
            Field::TieneTerraza => "tiene_terraza",
            Field::Piso => "piso",
            Field::Orientacion => "orientacion",
            Field::Antiguedad => "antiguedad",
            Field::DescripcionBreve => "descripcion_breve",
        }
    }

    /// Look up a field by its wire name.
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Semantic type of this field.
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::MetrosCuadradosCubiertos | Field::MetrosCuadradosTotales | Field::Precio => {
                FieldKind::Real
            }
            Field::CantidadDormitorios
            | Field::CantidadBanos
            | Field::CantidadAmbientes
            | Field::Antiguedad => FieldKind::Integer,
            Field::TienePatio
            | Field::TieneQuincho
            | Field::TienePileta
            | Field::TieneCochera
            | Field::TieneBalcon
            | Field::TieneTerraza => FieldKind::Bool,
            _ => FieldKind::Text,
        }
    }

    /// Human-readable hint for the completion prompt.
    pub fn prompt_hint(&self) -> &'static str {
        match self.kind() {
            FieldKind::Text => match self {
                Field::TipoOperacion => "\"venta\" o \"alquiler\"",
                Field::TipoInmueble => "\"casa\", \"departamento\", etc.",
                Field::Moneda => "\"USD\", \"ARS\", etc.",
                Field::Piso => "\"PB\", \"1\", \"2\", ... o null",
                Field::Orientacion => "\"Norte\", \"Sur\", \"Este\", \"Oeste\" o null",
                Field::DescripcionBreve => "resumen de máximo 200 caracteres",
                _ => "texto o null",
            },
            FieldKind::Integer => "número entero o null",
            FieldKind::Real => "número sin separadores de miles o null",
            FieldKind::Bool => "true o false",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Field {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Field::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown field: {name}")))
    }
}

/// A typed field value. Absence from a [`FieldMap`] means "unknown".
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FieldValue::Real(x) => Some(*x),
            FieldValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Real(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A partial or complete set of field values for one listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap(BTreeMap<Field, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.0.iter().map(|(f, v)| (*f, v))
    }

    /// Fields of the schema not present in this map.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| !self.contains(*f))
            .collect()
    }

    /// Combine two maps; anything present on the left is never overwritten.
    pub fn merge_prefer_left(left: &FieldMap, right: &FieldMap) -> FieldMap {
        let mut merged = left.clone();
        for (field, value) in right.iter() {
            merged.0.entry(field).or_insert_with(|| value.clone());
        }
        merged
    }
}
