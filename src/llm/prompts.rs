//! Prompt construction for field completion.

use std::collections::BTreeSet;

use crate::models::{Field, FieldMap, FieldValue};

/// Build the single completion request for a page's missing fields.
///
/// The prompt shows what structured extraction already resolved so the model
/// does not repeat those fields, lists only the missing ones with type hints,
/// and demands a bare JSON object as the reply.
pub fn extraction_prompt(
    url: &str,
    text: &str,
    extracted: &FieldMap,
    missing: &BTreeSet<Field>,
) -> String {
    let extracted_json = render_extracted(extracted);
    let field_lines: Vec<String> = missing
        .iter()
        .map(|f| format!("- \"{}\": {}", f.name(), f.prompt_hint()))
        .collect();

    format!(
        r#"Eres un asistente experto en extraer información de listados de propiedades inmobiliarias.

A continuación se te proporciona el texto de una página web de una propiedad.

URL: {url}

DATOS YA EXTRAÍDOS (NO NECESITAS EXTRAER ESTOS):
{extracted_json}

TEXTO DE LA PROPIEDAD:
{text}

Tu tarea es extraer ÚNICAMENTE la siguiente información que aún falta:

Campos a extraer:
{fields}

INSTRUCCIONES IMPORTANTES:
1. Devuelve ÚNICAMENTE un objeto JSON válido, sin texto adicional antes ni después.
2. Extrae SOLO los campos listados arriba que faltan. NO repitas los campos ya extraídos.
3. Para campos booleanos usa true/false.
4. Para campos numéricos, usa números sin comas ni puntos como separadores de miles.
5. Si no encuentras información para un campo, usa null.
6. Sé preciso y busca la información exacta en el texto.

Ahora extrae SOLO los campos faltantes de la propiedad:"#,
        url = url,
        extracted_json = extracted_json,
        text = text,
        fields = field_lines.join("\n"),
    )
}

/// Render the already-extracted values as a JSON object for the prompt.
fn render_extracted(extracted: &FieldMap) -> String {
    let mut obj = serde_json::Map::new();
    for (field, value) in extracted.iter() {
        let json = match value {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Integer(n) => serde_json::Value::from(*n),
            FieldValue::Real(x) => serde_json::Value::from(*x),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        };
        obj.insert(field.name().to_string(), json);
    }
    serde_json::to_string_pretty(&serde_json::Value::Object(obj)).unwrap_or_else(|_| "{}".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_only_missing_fields() {
        let mut extracted = FieldMap::new();
        extracted.insert(Field::Precio, FieldValue::Real(120000.0));

        let missing: BTreeSet<Field> = [Field::Direccion, Field::TienePatio].into_iter().collect();
        let prompt = extraction_prompt("https://example.com/1", "texto", &extracted, &missing);

        assert!(prompt.contains("\"direccion\""));
        assert!(prompt.contains("\"tiene_patio\""));
        assert!(prompt.contains("\"precio\": 120000"));
        assert!(!prompt.contains("- \"precio\""));
    }
}
