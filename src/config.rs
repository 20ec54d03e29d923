use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root data directory. The record store and the engine's index data
    /// both live under this directory.
    pub data_dir: PathBuf,
}

/// Index engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_index_uid")]
    pub index_uid: String,
    /// Name of the environment variable holding the engine master key
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
    /// Path to the engine executable, required only for `engine start`
    pub binary_path: Option<PathBuf>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

/// Parser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Pages per chunk for paged formats
    #[serde(default = "default_chunk_size_pages")]
    pub chunk_size_pages: usize,
    /// Hard cap on chunks per file; pages beyond the cap are not parsed
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

/// Indexing (batch submission) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
}

/// Search retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Page size used when fetching all hits
    #[serde(default = "default_search_batch_size")]
    pub batch_size: usize,
    /// Characters of context kept around a match when cropping content
    #[serde(default = "default_crop_length")]
    pub crop_length: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7700
}

fn default_index_uid() -> String {
    "documents".to_string()
}

fn default_master_key_env() -> String {
    "DOCDEX_MASTER_KEY".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    5
}

fn default_chunk_size_pages() -> usize {
    50
}

fn default_max_chunks() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_task_poll_interval_ms() -> u64 {
    100
}

fn default_search_batch_size() -> usize {
    500
}

fn default_crop_length() -> usize {
    50
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            chunk_size_pages: default_chunk_size_pages(),
            max_chunks: default_max_chunks(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            task_timeout_ms: default_task_timeout_ms(),
            task_poll_interval_ms: default_task_poll_interval_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_search_batch_size(),
            crop_length: default_crop_length(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DOCDEX_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DOCDEX_CONFIG")
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
        // The data directory is created on demand, but it must be creatable
        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir).with_context(|| {
                format!(
                    "data_dir cannot be created: {}. Set storage.data_dir in config.toml to a writable location.",
                    self.storage.data_dir.display()
                )
            })?;
        }

        if !self.storage.data_dir.is_dir() {
            anyhow::bail!(
                "data_dir must be a directory, not a file: {}",
                self.storage.data_dir.display()
            );
        }

        // The master key comes from the environment, never from config.toml
        std::env::var(&self.engine.master_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with the engine master key.",
                self.engine.master_key_env
            )
        })?;

        if self.parser.chunk_size_pages == 0 {
            anyhow::bail!("parser.chunk_size_pages must be greater than 0");
        }

        if self.parser.max_chunks == 0 {
            anyhow::bail!("parser.max_chunks must be greater than 0");
        }

        if self.indexing.batch_size == 0 {
            anyhow::bail!("indexing.batch_size must be greater than 0");
        }

        if self.indexing.task_poll_interval_ms == 0
            || self.indexing.task_poll_interval_ms > self.indexing.task_timeout_ms
        {
            anyhow::bail!(
                "indexing.task_poll_interval_ms must be between 1 and task_timeout_ms"
            );
        }

        if self.search.batch_size == 0 {
            anyhow::bail!("search.batch_size must be greater than 0");
        }

        Ok(())
    }

    /// Get the root data directory
    pub fn data_dir(&self) -> &Path {
        &self.storage.data_dir
    }

    /// Get the engine base URL
    pub fn engine_url(&self) -> String {
        format!("http://{}:{}", self.engine.host, self.engine.port)
    }

    /// Resolve the engine master key from the environment
    pub fn master_key(&self) -> Result<String> {
        std::env::var(&self.engine.master_key_env).with_context(|| {
            format!("Environment variable {} not set", self.engine.master_key_env)
        })
    }
}
