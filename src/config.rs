//! Process configuration.
//!
//! Settings are assembled exactly once at startup (defaults, then an
//! optional TOML file, then environment overrides) and passed by reference
//! into the components that need them. Pipeline code never reads the
//! environment on its own.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::scrapers::FetchConfig;

/// Default name of the optional config file, looked up in the working
/// directory.
pub const CONFIG_FILENAME: &str = "prop.toml";

/// Resolved settings for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the database and the data files.
    pub data_dir: PathBuf,
    pub database_filename: String,
    pub sites_filename: String,
    pub ledger_filename: String,
    pub inbox_filename: String,
    pub fetch: FetchConfig,
    pub llm: LlmConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_filename: "properties.db".to_string(),
            sites_filename: "site_configs.json".to_string(),
            ledger_filename: "properties-status.md".to_string(),
            inbox_filename: "links-to-scrap.md".to_string(),
            fetch: FetchConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Settings {
    /// Build settings for this invocation.
    ///
    /// Precedence, lowest to highest: defaults, the TOML config file,
    /// environment variables, the `--target` CLI override.
    pub fn load(config_path: Option<&Path>, target: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = Settings::default();

        let file = match config_path {
            Some(path) => Some(FileConfig::read(path)?),
            None => {
                let default_path = Path::new(CONFIG_FILENAME);
                if default_path.exists() {
                    Some(FileConfig::read(default_path)?)
                } else {
                    None
                }
            }
        };
        if let Some(file) = file {
            file.apply(&mut settings);
        }

        if let Ok(dir) = std::env::var("PROP_DATA_DIR") {
            settings.data_dir = expand_path(&dir);
        }
        settings.llm = settings.llm.with_env_overrides();

        if let Some(target) = target {
            settings.data_dir = target.to_path_buf();
        }

        Ok(settings)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn sites_path(&self) -> PathBuf {
        self.data_dir.join(&self.sites_filename)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_filename)
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.data_dir.join(&self.inbox_filename)
    }

    /// Create the data directory if needed.
    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })
    }
}

/// Shape of the optional TOML config file. Everything is optional; absent
/// keys keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub data_dir: Option<String>,
    pub database_filename: Option<String>,
    pub sites_filename: Option<String>,
    pub ledger_filename: Option<String>,
    pub inbox_filename: Option<String>,
    pub fetch: Option<FetchConfig>,
    pub llm: Option<LlmConfig>,
}

impl FileConfig {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("config file {} is not valid TOML", path.display()))
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(dir) = self.data_dir {
            settings.data_dir = expand_path(&dir);
        }
        if let Some(name) = self.database_filename {
            settings.database_filename = name;
        }
        if let Some(name) = self.sites_filename {
            settings.sites_filename = name;
        }
        if let Some(name) = self.ledger_filename {
            settings.ledger_filename = name;
        }
        if let Some(name) = self.inbox_filename {
            settings.inbox_filename = name;
        }
        if let Some(fetch) = self.fetch {
            settings.fetch = fetch;
        }
        if let Some(llm) = self.llm {
            settings.llm = llm;
        }
    }
}

/// Expand `~` in a configured path.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.database_path(), PathBuf::from("data/properties.db"));
        assert_eq!(
            settings.ledger_path(),
            PathBuf::from("data/properties-status.md")
        );
    }

    #[test]
    fn test_file_config_overrides() {
        let file: FileConfig = toml::from_str(
            r#"
            data_dir = "/tmp/props"
            database_filename = "test.db"

            [fetch]
            min_content_length = 500

            [llm]
            model = "llama3:8b"
            "#,
        )
        .unwrap();

        let mut settings = Settings::default();
        file.apply(&mut settings);
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/props"));
        assert_eq!(settings.database_filename, "test.db");
        assert_eq!(settings.fetch.min_content_length, 500);
        assert_eq!(settings.llm.model, "llama3:8b");
        // Unset keys keep defaults.
        assert_eq!(settings.sites_filename, "site_configs.json");
    }
}
