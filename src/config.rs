//! TOML configuration.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. [`load_config`] validates the parsed result.
//!
//! ```toml
//! [ledger]
//! difficulty = 2
//! max_attempts = 1000000
//! path = "./data/ledger.json"
//!
//! [chunking]
//! max_chars = 500
//!
//! [retrieval]
//! top_k = 5
//! semantic_threshold = 0.05
//!
//! [bridge]
//! provider = "ollama"
//! url = "http://localhost:11434"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use context_ledger_core::index::IndexParams;
use context_ledger_core::ledger::{LedgerParams, DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS};
use context_ledger_core::search::{RetrievalParams, DEFAULT_SEMANTIC_THRESHOLD, DEFAULT_TOP_K};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u64,
    /// Chain persistence file. In-memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            max_attempts: default_max_attempts(),
            path: None,
        }
    }
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}
fn default_max_attempts() -> u64 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            semantic_threshold: default_semantic_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_semantic_threshold() -> f64 {
    DEFAULT_SEMANTIC_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_url(),
            embed_model: default_embed_model(),
            vision_model: default_vision_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_vision_model() -> String {
    "llava".to_string()
}
fn default_chat_model() -> String {
    "llama3".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f64 {
    0.1
}

impl BridgeConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl Config {
    pub fn ledger_params(&self) -> LedgerParams {
        LedgerParams {
            difficulty: self.ledger.difficulty,
            max_attempts: self.ledger.max_attempts,
        }
    }

    pub fn index_params(&self) -> IndexParams {
        IndexParams {
            max_chars: self.chunking.max_chars,
        }
    }

    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.retrieval.top_k,
            semantic_threshold: self.retrieval.semantic_threshold,
        }
    }

    /// Check value ranges and the provider name.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if !(0.0..1.0).contains(&self.retrieval.semantic_threshold) {
            bail!("retrieval.semantic_threshold must be in [0.0, 1.0)");
        }

        if self.ledger.difficulty > 64 {
            bail!("ledger.difficulty must be <= 64");
        }

        if self.ledger.max_attempts < 1 {
            bail!("ledger.max_attempts must be >= 1");
        }

        if self.bridge.timeout_secs == 0 {
            bail!("bridge.timeout_secs must be > 0");
        }

        match self.bridge.provider.as_str() {
            "disabled" | "ollama" => {}
            other => bail!(
                "Unknown bridge provider: '{}'. Must be disabled or ollama.",
                other
            ),
        }

        Ok(())
    }
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields validated defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.max_attempts, 1_000_000);
        assert!(config.ledger.path.is_none());
        assert_eq!(config.chunking.max_chars, 500);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.semantic_threshold - 0.05).abs() < 1e-12);
        assert!(!config.bridge.is_enabled());
        assert_eq!(config.ingest.include_globs, vec!["**/*"]);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse(
            r#"
            [ledger]
            difficulty = 3
            path = "/tmp/chain.json"

            [bridge]
            provider = "ollama"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger_params().difficulty, 3);
        assert_eq!(config.ledger_params().max_attempts, 1_000_000);
        assert_eq!(config.ledger.path, Some(PathBuf::from("/tmp/chain.json")));
        assert!(config.bridge.is_enabled());
        assert_eq!(config.bridge.url, "http://localhost:11434");
        assert_eq!(config.bridge.timeout_secs, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse("[chunking]\nmax_chars = 0").is_err());
        assert!(parse("[retrieval]\ntop_k = 0").is_err());
        assert!(parse("[retrieval]\nsemantic_threshold = 1.5").is_err());
        assert!(parse("[ledger]\ndifficulty = 65").is_err());
        assert!(parse("[ledger]\nmax_attempts = 0").is_err());
        assert!(parse("[bridge]\ntimeout_secs = 0").is_err());
        let err = parse("[bridge]\nprovider = \"openai\"").unwrap_err();
        assert!(err.to_string().contains("Unknown bridge provider"));
    }

    #[test]
    fn test_missing_file_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/ctxl.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert!(load_config(Path::new("/nonexistent/ctxl.toml")).is_err());
    }
}
