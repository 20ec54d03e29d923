pub mod pdf;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::progress::ProgressSink;

/// Options controlling how a file is split into chunks
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Pages per chunk for paged formats
    pub chunk_size_pages: usize,
    /// Hard cap on chunks per file; pages past the cap are not parsed
    pub max_chunks: usize,
    /// Attach per-chunk metadata (page counts) when true
    pub extract_metadata: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            chunk_size_pages: 50,
            max_chunks: 1000,
            extract_metadata: true,
        }
    }
}

/// Per-chunk metadata attached when `extract_metadata` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub pages_in_chunk: usize,
}

/// One indexable slice of a document
///
/// This is also the document format submitted to the index engine, hence
/// the camelCase wire names. `id` is deterministic from (filePath,
/// chunkIndex); `fileId` is stamped by the orchestrator before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    #[serde(default)]
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub file_path: String,
    /// Unix milliseconds
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChunkMetadata>,
}

/// Successful parse output
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    pub chunks: Vec<Chunk>,
    pub total_pages: usize,
}

/// Capability: parse a file into ordered text chunks with progress events
///
/// Parsing does blocking I/O; callers on the async runtime should wrap
/// `parse` in `spawn_blocking`. Progress is advisory: implementations emit
/// a parsing-start event, one event per chunk boundary, and a terminal
/// completed or failed event, but an unobserved sink changes nothing.
pub trait Parseable: Send + Sync {
    /// Lowercase extensions (without dot) this parser handles
    fn extensions(&self) -> &'static [&'static str];

    /// Parse a file into ordered chunks
    fn parse(
        &self,
        path: &Path,
        options: &ParseOptions,
        progress: &ProgressSink,
    ) -> Result<ParsedFile>;
}

/// Registry mapping file extensions to parser implementations
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parseable>>,
    initialized: bool,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
            initialized: false,
        }
    }

    /// Register the built-in parsers. Idempotent: later calls are no-ops,
    /// so concurrent startup paths cannot double-register.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.register(Arc::new(pdf::PdfParser));
        self.initialized = true;
        log::debug!(
            "Parser registry initialized ({} extensions)",
            self.parsers.len()
        );
    }

    /// Create a registry with the built-in parsers already registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.initialize();
        registry
    }

    /// Register a parser under each of its extensions. Last registration
    /// for an extension wins.
    pub fn register(&mut self, parser: Arc<dyn Parseable>) {
        for ext in parser.extensions() {
            self.parsers.insert(ext.to_lowercase(), parser.clone());
        }
    }

    /// Look up a parser by the lowercase extension of `path`
    pub fn get_parser<P: AsRef<Path>>(&self, path: P) -> Option<Arc<dyn Parseable>> {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())?;
        self.parsers.get(&ext).cloned()
    }

    /// Whether the file's extension has a registered parser
    pub fn is_supported<P: AsRef<Path>>(&self, path: P) -> bool {
        self.get_parser(path).is_some()
    }

    /// All registered extensions, sorted
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.parsers.keys().cloned().collect();
        exts.sort();
        exts
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
