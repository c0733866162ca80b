use std::path::{Path, PathBuf};

use tracing::{info, warn};
use trellis_common::{Error, Result};

use crate::model::AppConfig;

/// Loads the application config from a TOML file, falling back to defaults
/// when no file exists. A `.env` file in the working directory is loaded
/// first so `*_api_key_env` references resolve.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default config location: `trellis.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from("trellis.toml")
    }

    pub fn load(&self) -> Result<AppConfig> {
        // Best-effort; a missing .env file is not an error.
        let _ = dotenvy::dotenv();

        if !self.path.exists() {
            warn!(
                "config file {} not found, using defaults",
                self.path.display()
            );
            return Ok(AppConfig::default());
        }

        let config = Self::load_from(&self.path)?;
        info!("loaded config from {}", self.path.display());
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<AppConfig> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let loader = ConfigLoader::new("/nonexistent/trellis.toml");
        let config = loader.load().expect("defaults should load");
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"
default_provider = "groq"

[gateway]
port = 9000

[llm.groq]
provider = "groq"
api_key_env = "GROQ_API_KEY"
model = "llama-3.3-70b-versatile"

[llm.openai]
provider = "openai"
api_key = "sk-test"

[redmine]
base_url = "https://redmine.example.com"
api_key = "abc123"

[memory]
max_messages = 8

[agents]
grading_enabled = true
"#
        )
        .expect("write config");

        let config = ConfigLoader::new(file.path()).load().expect("parse");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.default_provider.as_deref(), Some("groq"));
        assert_eq!(config.llm.len(), 2);
        assert_eq!(config.llm["groq"].model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(config.memory.max_messages, 8);
        assert!(config.agents.grading_enabled);
        let redmine = config.redmine.expect("redmine section");
        assert_eq!(redmine.base_url, "https://redmine.example.com");
        assert_eq!(redmine.metadata_file, "data/redmine_metadata.json");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "[gateway\nport = 1").expect("write config");

        let err = ConfigLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, trellis_common::Error::Config(_)));
    }
}
