//! Configuration loading and merging
//!
//! Settings come from three layers, later layers winning:
//! built-in defaults, a TOML config file, and environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StashError};

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration, merging file and environment layers over defaults.
    ///
    /// `explicit_path` (or `PAGESTASH_CONFIG`) names a specific file; otherwise
    /// the global `~/.config/pagestash/config.toml` is used when present.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("PAGESTASH_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&config_dir.join("pagestash/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| StashError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| StashError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("PAGESTASH_BACKEND") {
            if !value.trim().is_empty() {
                self.embedding.backend = value;
            }
        }
        if let Ok(value) = std::env::var("PAGESTASH_API_URL") {
            if !value.trim().is_empty() {
                self.embedding.api_url = value;
            }
        }
        if let Ok(value) = std::env::var("PAGESTASH_API_KEY") {
            if !value.trim().is_empty() {
                self.embedding.api_key = Some(value);
            }
        }
        if let Ok(value) = std::env::var("PAGESTASH_DATA_DIR") {
            if !value.trim().is_empty() {
                self.storage.data_dir = Some(PathBuf::from(value));
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dims == 0 {
            return Err(StashError::Config(
                "embedding.dims must be greater than 0".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.semantic_threshold) {
            return Err(StashError::Config(
                "search.semantic_threshold must be within [-1, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embedding backend selection and sizing
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Active backend: "local" (in-process) or "api" (remote HTTP)
    pub backend: String,
    /// Canonical vector dimension
    pub dims: usize,
    /// Character budget applied before embedding
    pub max_chars: usize,
    /// Remote embedding endpoint (api backend)
    pub api_url: String,
    /// Remote model name (api backend)
    pub api_model: String,
    /// Caller-supplied credential (api backend)
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            dims: 384,
            max_chars: 512,
            api_url: String::new(),
            api_model: "all-MiniLM-L6-v2".to_string(),
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
        if let Some(value) = patch.max_chars {
            self.max_chars = value;
        }
        if let Some(value) = patch.api_url {
            self.api_url = value;
        }
        if let Some(value) = patch.api_model {
            self.api_model = value;
        }
        if let Some(value) = patch.api_key {
            self.api_key = Some(value);
        }
    }
}

/// Search ranking knobs
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Queries shorter than this skip ranking entirely
    pub min_query_len: usize,
    /// Minimum cosine similarity for a semantic hit
    pub semantic_threshold: f32,
    /// Default number of results returned
    pub top_k: usize,
    /// Quiet period between keystrokes and execution, in milliseconds
    pub debounce_ms: u64,
    /// Cached query results kept in memory
    pub result_cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            semantic_threshold: 0.1,
            top_k: 5,
            debounce_ms: 300,
            result_cache_size: 128,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.min_query_len {
            self.min_query_len = value;
        }
        if let Some(value) = patch.semantic_threshold {
            self.semantic_threshold = value;
        }
        if let Some(value) = patch.top_k {
            self.top_k = value;
        }
        if let Some(value) = patch.debounce_ms {
            self.debounce_ms = value;
        }
        if let Some(value) = patch.result_cache_size {
            self.result_cache_size = value;
        }
    }
}

/// Storage location
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Data directory override; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.data_dir {
            self.data_dir = Some(value);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub embedding: Option<EmbeddingPatch>,
    pub search: Option<SearchPatch>,
    pub storage: Option<StoragePatch>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EmbeddingPatch {
    pub backend: Option<String>,
    pub dims: Option<usize>,
    pub max_chars: Option<usize>,
    pub api_url: Option<String>,
    pub api_model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SearchPatch {
    pub min_query_len: Option<usize>,
    pub semantic_threshold: Option<f32>,
    pub top_k: Option<usize>,
    pub debounce_ms: Option<u64>,
    pub result_cache_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StoragePatch {
    pub data_dir: Option<PathBuf>,
}
