//! Configuration types for hybrid retrieval.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Dense embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Sparse (TF-IDF) model configuration.
    #[serde(default)]
    pub sparse: SparseConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Indexing configuration.
    #[serde(default)]
    pub indexing: IndexingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Enable WAL mode (recommended).
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// SQLite cache size in KB (negative = KB, positive = pages).
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
            cache_size: -64000, // 64MB
            busy_timeout_ms: 30000,
        }
    }
}

/// Dense embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Output dimension of the model.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum tokens per input; longer inputs are truncated.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Feed a zeroed `token_type_ids` input (BERT-style models).
    #[serde(default = "default_true")]
    pub token_type_ids: bool,

    /// Prefix prepended to queries (asymmetric models only).
    #[serde(default)]
    pub query_prefix: String,

    /// Prefix prepended to documents (asymmetric models only).
    #[serde(default)]
    pub document_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            dimension: 384,
            max_tokens: 256,
            num_threads: 4,
            token_type_ids: true,
            query_prefix: String::new(),
            document_prefix: String::new(),
        }
    }
}

/// Sparse (TF-IDF) model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseConfig {
    /// Keep only this many most frequent terms.
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Drop English stop words.
    #[serde(default = "default_true")]
    pub stop_words: bool,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            stop_words: true,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Maximum number of results.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Hybrid dense weight (0 = sparse only, 1 = dense only).
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,

    /// Upper bound on a whole search call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            dense_weight: 0.5,
            timeout_ms: 5000,
        }
    }
}

/// Indexing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Documents embedded concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Documents per dense embedding batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Abort the build on the first per-document failure.
    #[serde(default)]
    pub strict: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 32,
            strict: false,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_cache_size() -> i32 {
    -64000
}

fn default_busy_timeout() -> u32 {
    30000
}

fn default_dimension() -> usize {
    384
}

fn default_max_tokens() -> usize {
    256
}

fn default_num_threads() -> usize {
    4
}

fn default_max_features() -> usize {
    1000
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

fn default_dense_weight() -> f32 {
    0.5
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_workers() -> usize {
    4
}

fn default_batch_size() -> usize {
    32
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hybrid-search")
        .join("hybrid.db")
}

fn default_model_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hybrid-search")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

impl HybridConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::HybridError::Config {
                message: format!("Failed to parse config: {}", e),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hybrid-search").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("hybrid-search.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |message: String| -> crate::error::Result<()> {
            Err(crate::error::HybridError::Config { message })
        };

        if !(0.0..=1.0).contains(&self.search.dense_weight) {
            return fail(format!(
                "search.dense_weight must be within [0, 1], got {}",
                self.search.dense_weight
            ));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return fail(format!(
                "search.default_limit must be within 1..={}",
                self.search.max_limit
            ));
        }
        if self.indexing.workers == 0 {
            return fail("indexing.workers must be at least 1".to_string());
        }
        if self.indexing.batch_size == 0 {
            return fail("indexing.batch_size must be at least 1".to_string());
        }
        if self.embedding.dimension == 0 {
            return fail("embedding.dimension must be at least 1".to_string());
        }
        Ok(())
    }
}
