//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Search pipeline settings
    #[serde(default)]
    pub search: SearchSettings,

    /// Full-text enrichment settings
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Gemini API key (required for query generation and analysis)
    #[serde(default)]
    pub gemini: Option<String>,

    /// NCBI API key (optional, raises the E-utilities rate limit)
    #[serde(default)]
    pub ncbi: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            gemini: std::env::var("GEMINI_API_KEY").ok(),
            ncbi: std::env::var("NCBI_API_KEY").ok(),
        }
    }
}

/// Search pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Requests per second against the E-utilities endpoints
    #[serde(default = "default_search_rps")]
    pub requests_per_second: u32,

    /// Maximum attempts per batch request
    #[serde(default = "default_search_attempts")]
    pub max_attempts: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            requests_per_second: default_search_rps(),
            max_attempts: default_search_attempts(),
        }
    }
}

fn default_search_rps() -> u32 {
    3
}

fn default_search_attempts() -> u32 {
    4
}

/// Full-text enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Concurrent full-text fetches
    #[serde(default = "default_enrichment_concurrency")]
    pub concurrency: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            concurrency: default_enrichment_concurrency(),
        }
    }
}

fn default_enrichment_concurrency() -> usize {
    5
}

/// Find the default config file, if one exists
pub fn find_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("litflow").join("config.toml");
    path.exists().then_some(path)
}

/// Load configuration from a file, with `LITFLOW_`-prefixed environment
/// variables taking precedence
pub fn load_config(path: &PathBuf) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("LITFLOW").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
