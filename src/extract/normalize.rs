//! Value coercion and normalization for extracted field values.
//!
//! Listing sites mix currencies, units, and Latin American number formats
//! freely ("USD 180.000", "120,50 m2", "a estrenar"). Everything that enters
//! a [`FieldMap`] passes through here so both extraction strategies produce
//! the same canonical values. A value that cannot be coerced is dropped, not
//! replaced with a zero sentinel.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Field, FieldKind, FieldValue};

fn first_int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("valid pattern"))
}

fn unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$|USD|ARS|EUR|m2|mt2|metros|cuadrados").expect("valid pattern")
    })
}

fn street_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^,]+?\d+)").expect("valid pattern"))
}

fn al_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+al\s+").expect("valid pattern"))
}

fn thousands_dot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\d{3}$").expect("valid pattern"))
}

/// Parse a real number out of a raw string, stripping currency and unit
/// tokens and resolving LatAm separator conventions:
/// `"180.000"` → 180000, `"120,50"` → 120.5, `"1.234.567,89"` → 1234567.89.
pub fn parse_real(raw: &str) -> Option<f64> {
    let stripped = unit_re().replace_all(raw, "");
    let mut v = stripped.trim().to_string();
    if v.is_empty() {
        return None;
    }

    if v.contains(',') && v.contains('.') {
        // Both present: dots are thousands separators, comma is decimal.
        v = v.replace('.', "").replace(',', ".");
    } else if v.contains(',') {
        v = v.replace(',', ".");
    } else if v.contains('.') {
        if v.matches('.').count() > 1 || thousands_dot_re().is_match(&v) {
            v = v.replace('.', "");
        }
        // Otherwise a single dot not followed by 3 trailing digits is decimal.
    }

    v.parse::<f64>().ok()
}

/// Parse the first integer found in a raw string.
pub fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.trim().parse::<i64>() {
        return Some(n);
    }
    first_int_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Interpret a matched pattern value as a boolean. A numeric match is true
/// when positive; any other non-negative wording counts as presence.
pub fn bool_from_match(raw: &str) -> bool {
    if let Ok(n) = raw.trim().parse::<i64>() {
        return n > 0;
    }
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "" | "0" | "no" | "false" | "none"
    )
}

/// Interpret a free-text answer as a boolean (positive list only).
pub fn bool_from_answer(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "si" | "sí" | "yes" | "1" | "t"
    )
}

/// Reduce an address to street + number:
/// `"3 De Febrero 1208 '09-01, Centro, Rosario"` → `"3 De Febrero 1208"`,
/// `"Moreno al 400"` → `"Moreno 400"`.
pub fn normalize_direccion(raw: &str) -> String {
    let address = al_re().replace_all(raw.trim(), " ").to_string();
    match street_number_re().captures(&address).and_then(|c| c.get(1)) {
        Some(m) => m
            .as_str()
            .trim()
            .trim_end_matches(['\'', '"', ',', '.'])
            .trim()
            .to_string(),
        None => address,
    }
}

/// Normalize a floor designation; negative answers become unknown and ground
/// floors collapse to "PB".
pub fn normalize_piso(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "ninguno" | "ningun" | "no especifica" | "n/a" | "null" | "-" | "piso" | "no"
        | "no tiene" => None,
        "pb" | "planta baja" | "p.b." | "0" => Some("PB".to_string()),
        _ => Some(raw.trim().to_string()),
    }
}

/// Parse a building age in years; "a estrenar"-style wording means 0.
pub fn parse_antiguedad(raw: &str) -> Option<i64> {
    let lower = raw.trim().to_lowercase();
    if ["a estrenar", "nuevo", "estreno", "0 años"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return Some(0);
    }
    first_int_re()
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Coerce a raw extracted string into a typed value for `field`.
///
/// Returns `None` when the value cannot be coerced; the caller treats the
/// field as unresolved.
pub fn coerce_text(field: Field, raw: &str) -> Option<FieldValue> {
    match field.kind() {
        FieldKind::Real => parse_real(raw).map(FieldValue::Real),
        FieldKind::Integer => match field {
            Field::Antiguedad => parse_antiguedad(raw).map(FieldValue::Integer),
            _ => parse_int(raw).map(FieldValue::Integer),
        },
        FieldKind::Bool => Some(FieldValue::Bool(bool_from_match(raw))),
        FieldKind::Text => {
            let s = raw.trim();
            if s.is_empty() {
                return None;
            }
            let value = match field {
                Field::TipoOperacion | Field::TipoInmueble => s.to_lowercase(),
                Field::Moneda => s.to_uppercase(),
                Field::Direccion => normalize_direccion(s),
                Field::Piso => return normalize_piso(s).map(FieldValue::Text),
                Field::DescripcionBreve => truncate_chars(s, 200),
                _ => truncate_chars(s, 500),
            };
            Some(FieldValue::Text(value))
        }
    }
}

/// Coerce an untrusted JSON value (a completion backend reply) into a typed
/// value for `field`. Type mismatches yield `None` rather than an error.
pub fn coerce_json(field: Field, value: &serde_json::Value) -> Option<FieldValue> {
    use serde_json::Value;

    match value {
        Value::Null => None,
        Value::String(s) => match field.kind() {
            // Models sometimes answer numbers and booleans as prose; reuse
            // the text coercion rules rather than rejecting outright.
            FieldKind::Bool => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(FieldValue::Bool(bool_from_answer(trimmed)))
                }
            }
            _ => coerce_text(field, s),
        },
        Value::Number(n) => match field.kind() {
            FieldKind::Real => n.as_f64().map(FieldValue::Real),
            FieldKind::Integer => n
                .as_i64()
                .or_else(|| n.as_f64().map(|x| x as i64))
                .map(FieldValue::Integer),
            FieldKind::Bool => Some(FieldValue::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
            FieldKind::Text => coerce_text(field, &n.to_string()),
        },
        Value::Bool(b) => match field.kind() {
            FieldKind::Bool => Some(FieldValue::Bool(*b)),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_real_latam_formats() {
        assert_eq!(parse_real("USD 180.000"), Some(180000.0));
        assert_eq!(parse_real("120,50 m2"), Some(120.5));
        assert_eq!(parse_real("1.234.567,89"), Some(1234567.89));
        assert_eq!(parse_real("$ 95.000"), Some(95000.0));
        assert_eq!(parse_real("80.5"), Some(80.5));
        assert_eq!(parse_real("metros cuadrados"), None);
        assert_eq!(parse_real("consultar"), None);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("3"), Some(3));
        assert_eq!(parse_int("3 dormitorios"), Some(3));
        assert_eq!(parse_int("sin datos"), None);
    }

    #[test]
    fn test_direccion_cleanup() {
        assert_eq!(
            normalize_direccion("3 De Febrero 1208 '09-01, Centro, Rosario"),
            "3 De Febrero 1208"
        );
        assert_eq!(normalize_direccion("Moreno  al 400"), "Moreno 400");
        assert_eq!(normalize_direccion("Bv. Oroño"), "Bv. Oroño");
    }

    #[test]
    fn test_piso_normalization() {
        assert_eq!(normalize_piso("Ninguno"), None);
        assert_eq!(normalize_piso("no tiene"), None);
        assert_eq!(normalize_piso("Planta Baja"), Some("PB".to_string()));
        assert_eq!(normalize_piso("pb"), Some("PB".to_string()));
        assert_eq!(normalize_piso("4"), Some("4".to_string()));
    }

    #[test]
    fn test_antiguedad() {
        assert_eq!(parse_antiguedad("a estrenar"), Some(0));
        assert_eq!(parse_antiguedad("0 años"), Some(0));
        assert_eq!(parse_antiguedad("15 años"), Some(15));
        assert_eq!(parse_antiguedad("antigua"), None);
    }

    #[test]
    fn test_bool_rules() {
        assert!(bool_from_match("1"));
        assert!(bool_from_match("2"));
        assert!(!bool_from_match("0"));
        assert!(!bool_from_match("no"));
        assert!(bool_from_match("con cochera"));

        assert!(bool_from_answer("Sí"));
        assert!(bool_from_answer("true"));
        assert!(!bool_from_answer("con cochera"));
        assert!(!bool_from_answer("no"));
    }

    #[test]
    fn test_coerce_text_by_field() {
        assert_eq!(
            coerce_text(Field::Precio, "USD 180.000"),
            Some(FieldValue::Real(180000.0))
        );
        assert_eq!(
            coerce_text(Field::Moneda, "usd"),
            Some(FieldValue::Text("USD".into()))
        );
        assert_eq!(
            coerce_text(Field::TipoOperacion, "Venta"),
            Some(FieldValue::Text("venta".into()))
        );
        assert_eq!(coerce_text(Field::Piso, "ninguno"), None);
        assert_eq!(coerce_text(Field::CantidadBanos, "dos"), None);
    }

    #[test]
    fn test_coerce_json_type_mismatches_dropped() {
        use serde_json::json;

        assert_eq!(
            coerce_json(Field::Precio, &json!(110000)),
            Some(FieldValue::Real(110000.0))
        );
        assert_eq!(
            coerce_json(Field::Precio, &json!("USD 110.000")),
            Some(FieldValue::Real(110000.0))
        );
        assert_eq!(coerce_json(Field::Precio, &json!(null)), None);
        assert_eq!(coerce_json(Field::Precio, &json!([1, 2])), None);
        assert_eq!(coerce_json(Field::Direccion, &json!(true)), None);
        assert_eq!(
            coerce_json(Field::TienePatio, &json!("Sí")),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(
            coerce_json(Field::Antiguedad, &json!("a estrenar")),
            Some(FieldValue::Integer(0))
        );
    }

    #[test]
    fn test_description_truncated() {
        let long = "x".repeat(300);
        match coerce_text(Field::DescripcionBreve, &long) {
            Some(FieldValue::Text(s)) => assert_eq!(s.chars().count(), 200),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
