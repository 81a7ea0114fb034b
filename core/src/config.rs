//! Persistent application settings (stored with confy as TOML)

use std::path::PathBuf;

use forage_types::{CharacterId, GatherTiming};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "forage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub character_id: CharacterId,
    pub catalog_path: PathBuf,
    /// Base URL of the discovery endpoint; discoveries stay local when unset
    pub discovery_url: Option<String>,
    pub timing: GatherTiming,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            character_id: CharacterId::from("player"),
            catalog_path: default_catalog_path(),
            discovery_url: None,
            timing: GatherTiming::default(),
        }
    }
}

impl AppConfig {
    pub fn try_load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, None)?)
    }

    /// Load the stored config, falling back to defaults if it can't be read
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using default config");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }
}

/// `<config dir>/forage/catalog.toml`, or `catalog.toml` in the working
/// directory if there is no config dir
pub fn default_catalog_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME).join("catalog.toml"))
        .unwrap_or_else(|| PathBuf::from("catalog.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Confy(#[from] confy::ConfyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use forage_types::AutoFailurePolicy;

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
character_id = "hero-7"
discovery_url = "http://localhost:8080/api"

[timing]
auto_failure_policy = "halt"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.character_id, CharacterId::from("hero-7"));
        assert_eq!(config.discovery_url.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(config.timing.auto_failure_policy, AutoFailurePolicy::Halt);
        assert_eq!(config.timing.tick_interval_ms, 100);
        assert_eq!(config.catalog_path, default_catalog_path());
    }

    #[test]
    fn test_default_round_trips() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
