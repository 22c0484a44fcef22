//! Per-site extraction configuration.
//!
//! Sites are described in a JSON file mapping domains to field patterns, so
//! adding a new listing source is a config edit, not a code change. All
//! patterns are validated and compiled at load time; nothing is re-parsed on
//! the per-page path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::Field;

/// Where a regex pattern searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    RawHtml,
    #[default]
    VisibleText,
}

/// A field pattern as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawFieldPattern {
    Regex {
        expression: String,
        #[serde(default)]
        search_scope: SearchScope,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transform: Option<HashMap<String, String>>,
    },
    CssSelector {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extract_regex: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transform: Option<HashMap<String, String>>,
    },
}

/// A site entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSiteConfig {
    pub name: String,
    pub structured_fields: Vec<Field>,
    #[serde(default)]
    pub llm_fields: Vec<Field>,
    #[serde(default)]
    pub patterns: HashMap<Field, RawFieldPattern>,
}

/// A compiled, validated field pattern.
#[derive(Debug, Clone)]
pub enum FieldPattern {
    Regex {
        regex: Regex,
        scope: SearchScope,
        transform: Option<HashMap<String, String>>,
    },
    Selector {
        selector: Selector,
        attribute: Option<String>,
        extract: Option<Regex>,
        transform: Option<HashMap<String, String>>,
    },
}

/// Validated configuration for one listing site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub structured_fields: Vec<Field>,
    pub llm_fields: Vec<Field>,
    patterns: HashMap<Field, FieldPattern>,
}

impl SiteConfig {
    /// Get the compiled pattern for a structured field.
    pub fn pattern(&self, field: Field) -> Option<&FieldPattern> {
        self.patterns.get(&field)
    }
}

/// Errors raised while loading the site configuration file. Fatal: a broken
/// config aborts the run before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read site config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("site config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("site {site}: {problem}")]
    Invalid { site: String, problem: String },
}

/// The URL's domain has no entry in the registry. The affected URL is
/// skipped; the run continues.
#[derive(Debug, Error)]
#[error("no site configuration matches host {0}")]
pub struct UnknownSiteError(pub String);

/// Registry of all configured sites, keyed by domain.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: HashMap<String, SiteConfig>,
}

impl SiteRegistry {
    /// Load and validate the registry from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&text)?;
        info!("Loaded configurations for {} sites", registry.len());
        Ok(registry)
    }

    /// Parse and validate the registry from JSON text.
    ///
    /// Top-level keys starting with `_` are treated as comments and skipped.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(text)?;

        let mut sites = HashMap::new();
        for (domain, value) in raw {
            if domain.starts_with('_') {
                continue;
            }
            let raw_site: RawSiteConfig = serde_json::from_value(value)?;
            let site = compile_site(&domain, raw_site)?;
            sites.insert(domain, site);
        }

        Ok(Self { sites })
    }

    /// Find the site configuration whose domain is a suffix of the URL's host.
    pub fn resolve(&self, url: &str) -> Result<&SiteConfig, UnknownSiteError> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| UnknownSiteError(url.to_string()))?;
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

        self.sites
            .iter()
            .find(|(domain, _)| host == **domain || host.ends_with(&format!(".{domain}")))
            .map(|(_, site)| site)
            .ok_or(UnknownSiteError(host))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Validate a raw site entry and compile its patterns.
fn compile_site(domain: &str, raw: RawSiteConfig) -> Result<SiteConfig, ConfigError> {
    let invalid = |problem: String| ConfigError::Invalid {
        site: domain.to_string(),
        problem,
    };

    let structured: HashSet<Field> = raw.structured_fields.iter().copied().collect();
    let llm: HashSet<Field> = raw.llm_fields.iter().copied().collect();

    if let Some(overlap) = structured.intersection(&llm).next() {
        return Err(invalid(format!(
            "field {overlap} is listed as both structured and llm"
        )));
    }
    for field in Field::ALL {
        if !structured.contains(&field) && !llm.contains(&field) {
            return Err(invalid(format!(
                "field {field} is neither structured nor llm"
            )));
        }
    }

    let mut patterns = HashMap::new();
    for (field, pattern) in raw.patterns {
        if !structured.contains(&field) {
            return Err(invalid(format!(
                "pattern defined for non-structured field {field}"
            )));
        }
        patterns.insert(field, compile_pattern(domain, field, pattern)?);
    }
    for field in &raw.structured_fields {
        if !patterns.contains_key(field) {
            return Err(invalid(format!("missing pattern for structured field {field}")));
        }
    }

    Ok(SiteConfig {
        name: raw.name,
        structured_fields: raw.structured_fields,
        llm_fields: raw.llm_fields,
        patterns,
    })
}

fn compile_pattern(
    domain: &str,
    field: Field,
    raw: RawFieldPattern,
) -> Result<FieldPattern, ConfigError> {
    let bad_regex = |expr: &str, e: regex::Error| ConfigError::Invalid {
        site: domain.to_string(),
        problem: format!("field {field}: invalid regex {expr:?}: {e}"),
    };

    match raw {
        RawFieldPattern::Regex {
            expression,
            search_scope,
            transform,
        } => {
            let regex = RegexBuilder::new(&expression)
                .case_insensitive(true)
                .build()
                .map_err(|e| bad_regex(&expression, e))?;
            Ok(FieldPattern::Regex {
                regex,
                scope: search_scope,
                transform,
            })
        }
        RawFieldPattern::CssSelector {
            selector,
            attribute,
            extract_regex,
            transform,
        } => {
            let selector = Selector::parse(&selector).map_err(|e| ConfigError::Invalid {
                site: domain.to_string(),
                problem: format!("field {field}: invalid selector {selector:?}: {e}"),
            })?;
            let extract = match extract_regex {
                Some(expr) => Some(
                    RegexBuilder::new(&expr)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| bad_regex(&expr, e))?,
                ),
                None => None,
            };
            Ok(FieldPattern::Selector {
                selector,
                attribute,
                extract,
                transform,
            })
        }
    }
}
