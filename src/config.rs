use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{GeozonesError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub wikidata: WikidataConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub natural_earth: String,
    pub geo_countries: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            natural_earth: constants::NATURAL_EARTH_URL.to_string(),
            geo_countries: constants::GEO_COUNTRIES_URL.to_string(),
            timeout_seconds: 120,
        }
    }
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: constants::WIKIDATA_SPARQL_ENDPOINT.to_string(),
            user_agent: constants::DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_OUTPUT),
        }
    }
}

impl Config {
    /// Load the configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GeozonesError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }

    /// Load `path` when given, else `config.toml` when present, else the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("GEOZONES_WIKIDATA_ENDPOINT") {
            self.wikidata.endpoint = endpoint;
        }
        if let Ok(output) = std::env::var("GEOZONES_OUTPUT") {
            self.output.path = PathBuf::from(output);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[sources]
natural_earth = "data/ne_110m.geojson"

[wikidata]
enabled = false
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sources.natural_earth, "data/ne_110m.geojson");
        assert_eq!(config.sources.geo_countries, constants::GEO_COUNTRIES_URL);
        assert_eq!(config.sources.timeout_seconds, 120);
        assert!(!config.wikidata.enabled);
        assert_eq!(config.wikidata.timeout_seconds, 60);
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = Config::load("does/not/exist.toml");
        assert!(matches!(result, Err(GeozonesError::Config(_))));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[wikidata\nenabled = nope").unwrap();
        assert!(matches!(Config::load(file.path()), Err(GeozonesError::Toml(_))));
    }
}
