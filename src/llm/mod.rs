//! Completion backend client for residual field extraction.
//!
//! Only fields that structured extraction could not resolve ever reach the
//! model; when nothing is missing, no request is made at all. The reply is
//! untrusted input: unknown keys and type mismatches are dropped before the
//! merge, and structured values always win.

mod config;
mod prompts;

use std::collections::BTreeSet;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::{LlmConfig, LlmProvider};

use crate::extract::{normalize, Extraction};
use crate::models::{Field, FieldMap};
use crate::scrapers::RawPage;
use crate::sites::SiteConfig;

/// Errors from the completion backend. The affected URL is recorded as
/// failed for the run; no retries happen here.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion backend unreachable: {0}")]
    Connection(String),
    #[error("completion backend error: {0}")]
    Api(String),
    #[error("completion reply unparseable: {0}")]
    Parse(String),
}

/// Completion client for residual listing fields.
pub struct CompletionClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// OpenAI-compatible chat request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl CompletionClient {
    /// Create a new completion client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Fill the fields structured extraction left unresolved.
    ///
    /// Returns the merged field map. When nothing is missing the partial map
    /// is returned unchanged and the backend is never contacted.
    pub async fn complete(
        &self,
        site: &SiteConfig,
        page: &RawPage,
        extraction: Extraction,
    ) -> Result<FieldMap, CompletionError> {
        let mut missing: BTreeSet<Field> = site.llm_fields.iter().copied().collect();
        missing.extend(extraction.unresolved.iter().copied());
        missing.retain(|f| !extraction.fields.contains(*f));

        if missing.is_empty() {
            debug!(url = %page.url, "all fields resolved by patterns, skipping completion");
            return Ok(extraction.fields);
        }

        info!(
            url = %page.url,
            structured = extraction.fields.len(),
            missing = missing.len(),
            "requesting completion for missing fields"
        );

        let text = truncate_chars(&page.text, self.config.max_content_chars);
        let prompt = prompts::extraction_prompt(&page.url, text, &extraction.fields, &missing);
        let reply = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(&prompt).await?,
            LlmProvider::OpenAI => self.call_openai(&prompt).await?,
        };

        let parsed = parse_completion(&reply, &missing)?;
        Ok(FieldMap::merge_prefer_left(&extraction.fields, &parsed))
    }

    /// Call the Ollama generate API.
    async fn call_ollama(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("HTTP {status}: {body}")));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Call an OpenAI-compatible chat completions API.
    async fn call_openai(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("HTTP {status}: {body}")));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Parse("reply contained no choices".to_string()))
    }
}

/// Parse and validate a completion reply against the requested fields.
///
/// The reply is expected to contain one JSON object; surrounding prose is
/// tolerated. Keys outside the requested set and values that fail typed
/// coercion are dropped rather than failing the pipeline.
pub fn parse_completion(
    reply: &str,
    missing: &BTreeSet<Field>,
) -> Result<FieldMap, CompletionError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(CompletionError::Parse(
                "no JSON object found in reply".to_string(),
            ))
        }
    };

    let object: serde_json::Value = serde_json::from_str(&reply[start..=end])
        .map_err(|e| CompletionError::Parse(format!("invalid JSON in reply: {e}")))?;
    let object = object
        .as_object()
        .ok_or_else(|| CompletionError::Parse("reply is not a JSON object".to_string()))?;

    let mut fields = FieldMap::new();
    for (key, value) in object {
        let field = match Field::from_name(key) {
            Some(f) => f,
            None => {
                warn!(key, "dropping hallucinated field from completion reply");
                continue;
            }
        };
        if !missing.contains(&field) {
            debug!(field = %field, "dropping unrequested field from completion reply");
            continue;
        }
        match normalize::coerce_json(field, value) {
            Some(coerced) => fields.insert(field, coerced),
            None => {
                debug!(field = %field, "dropping uncoercible completion value");
            }
        }
    }

    Ok(fields)
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::scrapers::FetchVia;

    fn missing(fields: &[Field]) -> BTreeSet<Field> {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_parse_reply_with_surrounding_prose() {
        let reply = r#"Claro, aquí está el JSON:
        {"direccion": "Cerrito 1700", "tiene_patio": true}
        Espero que sirva."#;
        let fields =
            parse_completion(reply, &missing(&[Field::Direccion, Field::TienePatio])).unwrap();
        assert_eq!(
            fields.get(Field::Direccion),
            Some(&FieldValue::Text("Cerrito 1700".into()))
        );
        assert_eq!(fields.get(Field::TienePatio), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_parse_drops_hallucinated_and_unrequested_keys() {
        let reply = r#"{"direccion": "Cerrito 1700", "precio": 999, "superficie_lote": 100}"#;
        let fields = parse_completion(reply, &missing(&[Field::Direccion])).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.get(Field::Precio).is_none());
    }

    #[test]
    fn test_parse_drops_type_mismatches_and_nulls() {
        let reply = r#"{"precio": {"amount": 1}, "barrio": null, "antiguedad": "15 años"}"#;
        let fields = parse_completion(
            reply,
            &missing(&[Field::Precio, Field::Barrio, Field::Antiguedad]),
        )
        .unwrap();
        assert!(fields.get(Field::Precio).is_none());
        assert!(fields.get(Field::Barrio).is_none());
        assert_eq!(fields.get(Field::Antiguedad), Some(&FieldValue::Integer(15)));
    }

    #[test]
    fn test_structured_values_survive_any_reply() {
        let mut partial = FieldMap::new();
        partial.insert(Field::Precio, FieldValue::Real(120000.0));
        partial.insert(Field::Moneda, FieldValue::Text("USD".into()));

        // The model answers the requested field but also tries to rewrite
        // the structured ones.
        let reply = r#"{"direccion": "San Luis 1200", "precio": 1, "moneda": "ARS"}"#;
        let parsed = parse_completion(reply, &missing(&[Field::Direccion])).unwrap();
        let merged = FieldMap::merge_prefer_left(&partial, &parsed);

        assert_eq!(merged.get(Field::Precio), Some(&FieldValue::Real(120000.0)));
        assert_eq!(
            merged.get(Field::Moneda),
            Some(&FieldValue::Text("USD".into()))
        );
        assert_eq!(
            merged.get(Field::Direccion),
            Some(&FieldValue::Text("San Luis 1200".into()))
        );
    }

    #[test]
    fn test_parse_requires_a_json_object() {
        assert!(parse_completion("no hay datos", &missing(&[Field::Barrio])).is_err());
        assert!(parse_completion("[1, 2, 3]", &missing(&[Field::Barrio])).is_err());
    }

    #[tokio::test]
    async fn test_complete_skips_backend_when_nothing_missing() {
        // Endpoint that would fail instantly if contacted.
        let config = LlmConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            ..LlmConfig::default()
        };
        let client = CompletionClient::new(config);

        let registry = crate::sites::SiteRegistry::from_json(&format!(
            r#"{{"example.com": {{
                "name": "Example",
                "structured_fields": [{}],
                "llm_fields": [],
                "patterns": {{{}}}
            }}}}"#,
            Field::ALL
                .iter()
                .map(|f| format!("\"{}\"", f.name()))
                .collect::<Vec<_>>()
                .join(", "),
            Field::ALL
                .iter()
                .map(|f| format!(
                    "\"{}\": {{\"kind\": \"regex\", \"expression\": \"({})\"}}",
                    f.name(),
                    f.name()
                ))
                .collect::<Vec<_>>()
                .join(", "),
        ))
        .unwrap();
        let site = registry.resolve("https://example.com/x").unwrap();

        let mut extraction = Extraction::default();
        for field in Field::ALL {
            extraction
                .fields
                .insert(field, crate::extract::normalize::coerce_text(field, "1").unwrap_or(FieldValue::Text("x".into())));
        }

        let page = RawPage::new(
            "https://example.com/x".to_string(),
            "<p>page</p>",
            FetchVia::LightClient,
        );
        let result = client
            .complete(site, &page, extraction.clone())
            .await
            .unwrap();
        assert_eq!(result, extraction.fields);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("más texto", 3), "más");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
