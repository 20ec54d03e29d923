pub mod meili;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::parsers::Chunk;

pub use meili::MeiliIndexClient;

/// Optional constraints applied to both query phases
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Engine filter expression, e.g. `fileId = "abc"`
    pub filter: Option<String>,
    /// Sort expressions, e.g. `createdAt:desc`
    pub sort: Option<Vec<String>>,
    /// Retrieve full chunk content in addition to the cropped snippet
    pub include_content: bool,
}

/// Result of the cheap limit-0 probe phase
#[derive(Debug, Clone)]
pub struct SearchProbe {
    pub estimated_total_hits: u64,
    pub processing_time_ms: u64,
    pub facet_distribution: Option<serde_json::Value>,
    pub query: String,
}

/// One retrieval page of hits
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub processing_time_ms: u64,
}

/// A single search hit with snippet/highlight payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Cropped/highlighted rendition of the hit, as returned by the engine
    #[serde(rename = "_formatted", default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<serde_json::Value>,
    #[serde(
        rename = "_matchesPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub matches_position: Option<serde_json::Value>,
}

/// Index-level statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    pub is_indexing: bool,
    #[serde(default)]
    pub field_distribution: HashMap<String, u64>,
}

/// Capability: a remote document index with asynchronous task semantics
///
/// `index_batch` submits one batch and resolves its engine task to a
/// terminal state before returning, so a returned `Ok` means the batch is
/// durable. Implementations must be safe for concurrent use behind an
/// `Arc`.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Create the index and (re)apply attribute settings. Idempotent.
    async fn ensure_index(&self) -> Result<()>;

    /// Submit one batch of chunks and await engine acknowledgement
    async fn index_batch(&self, chunks: &[Chunk]) -> Result<()>;

    /// Bulk-delete all chunks of a file by filter, returning how many
    /// chunks were removed
    async fn delete_by_file_id(&self, file_id: &str) -> Result<u64>;

    /// Limit-0 probe returning hit count and facet distribution
    async fn search_count(&self, query: &str, params: &SearchParams) -> Result<SearchProbe>;

    /// One retrieval page with cropping, highlighting, and match positions
    async fn search_page(
        &self,
        query: &str,
        params: &SearchParams,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage>;

    /// Index statistics
    async fn stats(&self) -> Result<IndexStats>;

    /// Remove every document from the index
    async fn clear(&self) -> Result<()>;

    /// Whether the engine answers its health endpoint
    async fn health(&self) -> bool;
}
