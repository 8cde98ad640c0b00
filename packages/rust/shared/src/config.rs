//! Application configuration for Draftsmith.
//!
//! User config lives at `~/.draftsmith/draftsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DraftsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "draftsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".draftsmith";

// ---------------------------------------------------------------------------
// Config structs (matching draftsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Document-retrieval service settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Stage and loop settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature. Zero keeps the critic deterministic.
    #[serde(default)]
    pub temperature: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on service errors.
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            api_key_env: default_generation_key_env(),
            model: default_model(),
            temperature: 0.0,
            timeout_secs: default_generation_timeout(),
            max_retries: default_generation_retries(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_generation_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4-1106-preview".into()
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_generation_retries() -> u32 {
    2
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of the search API (without `/search`).
    #[serde(default = "default_retrieval_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_retrieval_key_env")]
    pub api_key_env: String,

    /// Number of documents requested per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-call timeout in seconds.
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on service errors.
    #[serde(default = "default_retrieval_retries")]
    pub max_retries: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_retrieval_base_url(),
            api_key_env: default_retrieval_key_env(),
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
            max_retries: default_retrieval_retries(),
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_retrieval_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_retrieval_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_top_k() -> usize {
    10
}
fn default_retrieval_timeout() -> u64 {
    30
}
fn default_retrieval_retries() -> u32 {
    1
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum number of revise passes before giving up.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: usize,

    /// Number of sources the curator is asked to keep.
    #[serde(default = "default_curate_count")]
    pub curate_count: usize,

    /// Topics shorter than this are prefixed before searching.
    #[serde(default = "default_min_topic_len")]
    pub min_topic_len: usize,

    /// Prefix applied to short topics.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Per-document character budget when building the writer prompt.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            curate_count: default_curate_count(),
            min_topic_len: default_min_topic_len(),
            topic_prefix: default_topic_prefix(),
            max_source_chars: default_max_source_chars(),
        }
    }
}

fn default_max_revisions() -> usize {
    5
}
fn default_curate_count() -> usize {
    5
}
fn default_min_topic_len() -> usize {
    5
}
fn default_topic_prefix() -> String {
    "topic: ".into()
}
fn default_max_source_chars() -> usize {
    12_000
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Revise passes allowed before `RevisionLimitExceeded`.
    pub max_revisions: usize,
    /// Documents requested from retrieval.
    pub top_k: usize,
    /// Sources kept by curation.
    pub curate_count: usize,
    /// Minimum topic length before prefixing.
    pub min_topic_len: usize,
    /// Prefix for short topics.
    pub topic_prefix: String,
    /// Per-document character budget in the writer prompt.
    pub max_source_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_revisions: config.pipeline.max_revisions,
            top_k: config.retrieval.top_k,
            curate_count: config.pipeline.curate_count,
            min_topic_len: config.pipeline.min_topic_len,
            topic_prefix: config.pipeline.topic_prefix.clone(),
            max_source_chars: config.pipeline.max_source_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.draftsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DraftsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.draftsmith/draftsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DraftsmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DraftsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DraftsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DraftsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DraftsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named env var.
pub fn api_key_from_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DraftsmithError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both service API key env vars are set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    api_key_from_env(&config.generation.api_key_env)?;
    api_key_from_env(&config.retrieval.api_key_env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_revisions"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("TAVILY_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retrieval.top_k, 10);
        assert_eq!(parsed.pipeline.topic_prefix, "topic: ");
        assert_eq!(parsed.generation.temperature, 0.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[generation]
model = "gpt-4o-mini"

[pipeline]
max_revisions = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.pipeline.max_revisions, 2);
        assert_eq!(config.pipeline.curate_count, 5);
        assert_eq!(config.retrieval.api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.max_revisions, 5);
        assert_eq!(pipeline.top_k, 10);
        assert_eq!(pipeline.curate_count, 5);
        assert_eq!(pipeline.min_topic_len, 5);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.generation.api_key_env = "DS_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_keys(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
