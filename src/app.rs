use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::delete;
use crate::error::{DocdexError, Result};
use crate::index::{DocumentIndex, IndexStats, MeiliIndexClient};
use crate::ingest::{self, IngestOptions, IngestReport};
use crate::parsers::ParserRegistry;
use crate::progress::ProgressSink;
use crate::search::{self, SearchOptions, SearchResult};
use crate::store::{FileRecord, RecordStore};

/// Uniform envelope for results crossing the process boundary
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Top-level application context
///
/// Owns the parser registry, the record store, and the index client, and
/// exposes every operation the front end calls. Constructed once and shared.
pub struct App {
    config: Config,
    registry: ParserRegistry,
    store: RecordStore,
    index: Arc<dyn DocumentIndex>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let master_key = config
            .master_key()
            .map_err(|e| DocdexError::Config(e.to_string()))?;
        let index = MeiliIndexClient::new(
            &config.engine_url(),
            &master_key,
            &config.engine.index_uid,
            &config.indexing,
            &config.search,
        )?;

        Ok(Self {
            config,
            registry: ParserRegistry::with_defaults(),
            store: RecordStore::new(),
            index: Arc::new(index),
        })
    }

    #[cfg(test)]
    fn with_index(config: Config, index: Arc<dyn DocumentIndex>) -> Self {
        Self {
            config,
            registry: ParserRegistry::with_defaults(),
            store: RecordStore::new(),
            index,
        }
    }

    /// Open the record store and make sure the index exists with the
    /// expected settings. Requires a reachable engine.
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize(self.config.data_dir()).await?;
        self.ensure_engine().await?;
        self.index.ensure_index().await?;
        Ok(())
    }

    async fn ensure_engine(&self) -> Result<()> {
        if !self.index.health().await {
            return Err(DocdexError::EngineNotReady);
        }
        Ok(())
    }

    /// Parse and index files, reporting per-file outcomes
    pub async fn ingest(&self, paths: &[PathBuf], progress: &ProgressSink) -> Result<IngestReport> {
        self.ensure_engine().await?;
        let options = IngestOptions::from_config(&self.config);
        Ok(ingest::ingest_files(
            &self.registry,
            self.index.as_ref(),
            &self.store,
            paths,
            &options,
            progress,
        )
        .await)
    }

    /// Remove a file's chunks and its upload record
    pub async fn delete_file(&self, file_id: &str) -> Result<u64> {
        self.ensure_engine().await?;
        delete::delete_file(self.index.as_ref(), &self.store, file_id).await
    }

    /// Full-text search across indexed chunks
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResult> {
        search::search(self.index.as_ref(), query, options).await
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::from_config(&self.config.search)
    }

    /// Upload records, most recent first
    pub async fn list_records(&self) -> Result<Vec<FileRecord>> {
        self.store.get_all().await
    }

    pub async fn get_record(&self, file_id: &str) -> Result<Option<FileRecord>> {
        self.store.get_by_id(file_id).await
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.registry.supported_extensions()
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    /// Whether the engine currently answers its health endpoint
    pub async fn engine_healthy(&self) -> bool {
        self.index.health().await
    }

    /// Drop every document from the index. Upload records are kept so
    /// files can be re-ingested from them.
    pub async fn clear_index(&self) -> Result<()> {
        self.ensure_engine().await?;
        self.index.clear().await
    }

    /// Release resources. Idempotent.
    pub fn shutdown(&self) {
        self.store.close();
        log::info!("Application shut down");
    }
}
