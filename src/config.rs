use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an optional override file
pub const CONFIG_PATH_ENV: &str = "METADATA_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// State backend configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Search and pagination configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(config_path.as_deref())
    }

    /// Load configuration with an explicit override file
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder
            // Override with environment variables (prefix: METADATA__)
            .add_source(
                config::Environment::with_prefix("METADATA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database (sled)
    pub path: Option<PathBuf>,

    /// Redis connection string
    pub redis_url: Option<String>,

    /// Prefix for every redis key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            path: None,
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Memory,
    Sled,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when a caller does not supply one
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound applied to every requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_key_prefix() -> String {
    "metadata".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_page_size(), 20);
        assert_eq!(default_max_page_size(), 1000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_key_prefix(), "metadata");
    }

    #[test]
    fn test_state_backend_default() {
        assert_eq!(StateBackend::default(), StateBackend::Memory);
    }

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config = Config::load_from(None).unwrap();
        assert_eq!(config.state.backend, StateBackend::Memory);
        assert_eq!(config.search.default_page_size, 20);
        assert_eq!(config.search.max_page_size, 1000);
        assert!(!config.observability.json_logs);
    }

    #[test]
    fn test_override_file_wins_over_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(
            &path,
            "[state]\nbackend = \"sled\"\npath = \"/tmp/metadata\"\n\n[search]\nmax_page_size = 50\n",
        )
        .unwrap();

        let config = Config::load_from(path.to_str()).unwrap();
        assert_eq!(config.state.backend, StateBackend::Sled);
        assert_eq!(config.state.path, Some(PathBuf::from("/tmp/metadata")));
        assert_eq!(config.search.max_page_size, 50);
        assert_eq!(config.search.default_page_size, 20);
    }
}
