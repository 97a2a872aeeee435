use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ontomap: OntomapConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub profiling: ProfilingConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Ontomap-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OntomapConfig {
    /// Path to the ontology store (SQLite database).
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// LLM client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Column profiling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilingConfig {
    /// Maximum distinct values sampled per column.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    /// A column is enum-like when it has at most this many distinct values...
    #[serde(default = "default_enum_max_distinct")]
    pub enum_max_distinct: i64,
    /// ...covering at most this fraction of rows.
    #[serde(default = "default_enum_max_ratio")]
    pub enum_max_ratio: f64,
}

/// Entity-candidate column filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FilteringConfig {
    #[serde(default = "default_min_distinct_for_candidate")]
    pub min_distinct_for_candidate: i64,
    /// Strict lower bound on distinct/row ratio for candidates.
    #[serde(default = "default_min_distinct_ratio")]
    pub min_distinct_ratio: f64,
    /// Legacy name-pattern rules, for datasources without column metadata.
    #[serde(default)]
    pub use_name_patterns: bool,
}

/// Relationship value-matching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Non-PK columns need more distinct values than this to be joinable.
    #[serde(default = "default_low_cardinality_threshold")]
    pub low_cardinality_threshold: i64,
    /// Minimum sample overlap rate for a value-match candidate.
    #[serde(default = "default_min_value_match_rate")]
    pub min_value_match_rate: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_retries() -> usize {
    3
}

fn default_cache_capacity() -> usize {
    256
}

fn default_sample_limit() -> usize {
    100
}

fn default_enum_max_distinct() -> i64 {
    5
}

fn default_enum_max_ratio() -> f64 {
    0.01
}

fn default_min_distinct_for_candidate() -> i64 {
    20
}

fn default_min_distinct_ratio() -> f64 {
    0.05
}

fn default_low_cardinality_threshold() -> i64 {
    20
}

fn default_min_value_match_rate() -> f64 {
    0.6
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
            enum_max_distinct: default_enum_max_distinct(),
            enum_max_ratio: default_enum_max_ratio(),
        }
    }
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            min_distinct_for_candidate: default_min_distinct_for_candidate(),
            min_distinct_ratio: default_min_distinct_ratio(),
            use_name_patterns: false,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            low_cardinality_threshold: default_low_cardinality_threshold(),
            min_value_match_rate: default_min_value_match_rate(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ONTOMAP_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ONTOMAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.filtering.min_distinct_ratio) {
            anyhow::bail!("filtering.min_distinct_ratio must be between 0.0 and 1.0");
        }

        if !(0.0..=1.0).contains(&self.profiling.enum_max_ratio) {
            anyhow::bail!("profiling.enum_max_ratio must be between 0.0 and 1.0");
        }

        if !(0.0..=1.0).contains(&self.matching.min_value_match_rate) {
            anyhow::bail!("matching.min_value_match_rate must be between 0.0 and 1.0");
        }

        if self.profiling.sample_limit == 0 {
            anyhow::bail!("profiling.sample_limit must be greater than 0");
        }

        if self.profiling.enum_max_distinct <= 0 {
            anyhow::bail!("profiling.enum_max_distinct must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.ontomap.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_CONFIG: &str = r#"
[ontomap]
db_path = "./ontology.db"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL_CONFIG).unwrap();
        assert_eq!(config.ontomap.log_level, "info");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.profiling.enum_max_distinct, 5);
        assert_eq!(config.profiling.enum_max_ratio, 0.01);
        assert_eq!(config.filtering.min_distinct_for_candidate, 20);
        assert_eq!(config.filtering.min_distinct_ratio, 0.05);
        assert!(!config.filtering.use_name_patterns);
        assert_eq!(config.matching.min_value_match_rate, 0.6);
        assert_eq!(config.matching.low_cardinality_threshold, 20);
    }

    #[test]
    fn test_threshold_overrides() {
        let config: Config = toml::from_str(
            r#"
[ontomap]
db_path = "./ontology.db"

[profiling]
enum_max_distinct = 10
enum_max_ratio = 0.02

[matching]
min_value_match_rate = 0.75
"#,
        )
        .unwrap();
        assert_eq!(config.profiling.enum_max_distinct, 10);
        assert_eq!(config.profiling.enum_max_ratio, 0.02);
        assert_eq!(config.matching.min_value_match_rate, 0.75);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let config: Config = toml::from_str(
            r#"
[ontomap]
db_path = "./ontology.db"

[matching]
min_value_match_rate = 1.5
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sample_limit() {
        let config: Config = toml::from_str(
            r#"
[ontomap]
db_path = "./ontology.db"

[profiling]
sample_limit = 0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
