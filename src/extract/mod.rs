//! Deterministic pattern-based field extraction.
//!
//! This is the precision half of the hybrid pipeline: values matched here are
//! trusted completely and are never overwritten by the completion step. The
//! extractor is a pure function of the site config and the fetched page; it
//! performs no I/O of any kind.

pub mod normalize;

use std::collections::BTreeSet;

use scraper::Html;
use tracing::debug;

use crate::models::{Field, FieldMap};
use crate::scrapers::RawPage;
use crate::sites::{FieldPattern, SearchScope, SiteConfig};

/// Result of running the structured patterns over one page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Fields the patterns resolved, fully coerced.
    pub fields: FieldMap,
    /// Structured fields that could not be resolved (no match, or the
    /// matched value failed coercion).
    pub unresolved: BTreeSet<Field>,
}

/// Apply a site's structured patterns to a fetched page.
pub fn extract(site: &SiteConfig, page: &RawPage) -> Extraction {
    let doc = Html::parse_document(&page.html);
    let mut result = Extraction::default();

    for &field in &site.structured_fields {
        let pattern = match site.pattern(field) {
            Some(p) => p,
            // The registry guarantees a pattern per structured field.
            None => {
                result.unresolved.insert(field);
                continue;
            }
        };

        let raw = match pattern {
            FieldPattern::Regex {
                regex,
                scope,
                transform,
            } => {
                let haystack = match scope {
                    SearchScope::RawHtml => page.html.as_str(),
                    SearchScope::VisibleText => page.text.as_str(),
                };
                regex
                    .captures(haystack)
                    .and_then(|caps| caps.get(1))
                    .map(|m| apply_transform(m.as_str(), transform.as_ref()))
            }
            FieldPattern::Selector {
                selector,
                attribute,
                extract,
                transform,
            } => doc.select(selector).next().and_then(|element| {
                let text = match attribute {
                    Some(attr) => element.value().attr(attr)?.trim().to_string(),
                    None => element.text().collect::<String>().trim().to_string(),
                };
                let text = match extract {
                    Some(regex) => regex
                        .captures(&text)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string())?,
                    None => text,
                };
                Some(apply_transform(&text, transform.as_ref()))
            }),
        };

        match raw.and_then(|value| normalize::coerce_text(field, &value)) {
            Some(value) => {
                debug!(field = %field, value = %value, "pattern matched");
                result.fields.insert(field, value);
            }
            None => {
                result.unresolved.insert(field);
            }
        }
    }

    result
}

/// Rewrite a matched value through the pattern's exact-match table, if any.
fn apply_transform(
    value: &str,
    transform: Option<&std::collections::HashMap<String, String>>,
) -> String {
    match transform.and_then(|t| t.get(value)) {
        Some(mapped) => mapped.clone(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::scrapers::{FetchVia, RawPage};
    use crate::sites::SiteRegistry;

    fn page(html: &str) -> RawPage {
        RawPage::new("https://example.com/p/1".to_string(), html, FetchVia::LightClient)
    }

    fn registry(structured: &[(&str, &str)]) -> SiteRegistry {
        let structured_names: Vec<&str> = structured.iter().map(|(f, _)| *f).collect();
        let llm: Vec<String> = Field::ALL
            .iter()
            .filter(|f| !structured_names.contains(&f.name()))
            .map(|f| format!("\"{}\"", f.name()))
            .collect();
        let patterns: Vec<String> = structured
            .iter()
            .map(|(field, pattern)| format!("\"{field}\": {pattern}"))
            .collect();
        let json = format!(
            r#"{{"example.com": {{
                "name": "Example",
                "structured_fields": [{}],
                "llm_fields": [{}],
                "patterns": {{{}}}
            }}}}"#,
            structured_names
                .iter()
                .map(|f| format!("\"{f}\""))
                .collect::<Vec<_>>()
                .join(", "),
            llm.join(", "),
            patterns.join(", ")
        );
        SiteRegistry::from_json(&json).unwrap()
    }

    #[test]
    fn test_regex_extraction_with_transform() {
        let registry = registry(&[
            (
                "precio",
                r#"{"kind": "regex", "expression": "(?:U\\$S|USD|ARS)\\s*([\\d.,]+)"}"#,
            ),
            (
                "moneda",
                r#"{"kind": "regex", "expression": "(U\\$S|USD|ARS)", "transform": {"U$S": "USD"}}"#,
            ),
        ]);
        let site = registry.resolve("https://example.com/p/1").unwrap();

        // Canonical token: no transform rewrite needed.
        let plain = extract(site, &page("<html><body><p>Venta USD 120.000</p></body></html>"));
        assert_eq!(plain.fields.get(Field::Precio), Some(&FieldValue::Real(120000.0)));
        assert_eq!(
            plain.fields.get(Field::Moneda),
            Some(&FieldValue::Text("USD".into()))
        );
        assert!(plain.unresolved.is_empty());

        // Site-specific token rewritten through the transform table.
        let local = extract(site, &page("<html><body><p>Venta U$S 95.000</p></body></html>"));
        assert_eq!(local.fields.get(Field::Precio), Some(&FieldValue::Real(95000.0)));
        assert_eq!(
            local.fields.get(Field::Moneda),
            Some(&FieldValue::Text("USD".into()))
        );
    }

    #[test]
    fn test_selector_extraction_text_and_attribute() {
        let registry = registry(&[
            (
                "barrio",
                r#"{"kind": "css_selector", "selector": "span.barrio"}"#,
            ),
            (
                "direccion",
                r#"{"kind": "css_selector", "selector": "div#addr", "attribute": "data-street"}"#,
            ),
            (
                "cantidad_dormitorios",
                r#"{"kind": "css_selector", "selector": "li.dorms", "extract_regex": "(\\d+)\\s*dorm"}"#,
            ),
        ]);
        let site = registry.resolve("https://example.com/p/1").unwrap();
        let page = page(
            r#"<html><body>
                <span class="barrio">Alberdi</span>
                <div id="addr" data-street="Moreno al 400"></div>
                <li class="dorms">3 dormitorios</li>
            </body></html>"#,
        );

        let result = extract(site, &page);
        assert_eq!(
            result.fields.get(Field::Barrio),
            Some(&FieldValue::Text("Alberdi".into()))
        );
        assert_eq!(
            result.fields.get(Field::Direccion),
            Some(&FieldValue::Text("Moreno 400".into()))
        );
        assert_eq!(
            result.fields.get(Field::CantidadDormitorios),
            Some(&FieldValue::Integer(3))
        );
    }

    #[test]
    fn test_unmatched_and_uncoercible_are_unresolved() {
        let registry = registry(&[
            (
                "precio",
                r#"{"kind": "regex", "expression": "Precio:\\s*([\\d.,]+)"}"#,
            ),
            (
                "cantidad_banos",
                r#"{"kind": "css_selector", "selector": "span.banos"}"#,
            ),
        ]);
        let site = registry.resolve("https://example.com/p/1").unwrap();
        // Price pattern misses; baths match but are not numeric.
        let page = page(r#"<html><body><span class="banos">consultar</span></body></html>"#);

        let result = extract(site, &page);
        assert!(result.fields.get(Field::Precio).is_none());
        assert!(result.fields.get(Field::CantidadBanos).is_none());
        assert!(result.unresolved.contains(&Field::Precio));
        assert!(result.unresolved.contains(&Field::CantidadBanos));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let registry = registry(&[(
            "precio",
            r#"{"kind": "regex", "expression": "USD\\s*([\\d.,]+)"}"#,
        )]);
        let site = registry.resolve("https://example.com/p/1").unwrap();
        let page = page("<p>USD 95.000</p>");

        let first = extract(site, &page);
        let second = extract(site, &page);
        assert_eq!(first.fields, second.fields);
        assert_eq!(first.unresolved, second.unresolved);
    }

    #[test]
    fn test_boolean_presence() {
        let registry = registry(&[(
            "tiene_cochera",
            r#"{"kind": "regex", "expression": "(cochera)"}"#,
        )]);
        let site = registry.resolve("https://example.com/p/1").unwrap();

        let with = extract(site, &page("<p>Cuenta con cochera para 2 autos</p>"));
        assert_eq!(
            with.fields.get(Field::TieneCochera),
            Some(&FieldValue::Bool(true))
        );

        let without = extract(site, &page("<p>Sin amenities</p>"));
        assert!(without.unresolved.contains(&Field::TieneCochera));
    }
}
