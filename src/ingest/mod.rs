use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{DocdexError, Result};
use crate::hash::file_id;
use crate::index::DocumentIndex;
use crate::parsers::{ParseOptions, ParserRegistry};
use crate::progress::{ProgressSink, ProgressStatus};
use crate::store::{FileRecord, RecordStore};

/// Options for one ingestion call
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub parse: ParseOptions,
    /// Chunks per index submission batch
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            batch_size: 100,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            parse: ParseOptions {
                chunk_size_pages: config.parser.chunk_size_pages,
                max_chunks: config.parser.max_chunks,
                extract_metadata: true,
            },
            batch_size: config.indexing.batch_size,
        }
    }
}

/// One file that could not be ingested
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub file_name: String,
    pub error: String,
}

/// Aggregate result of an ingestion call
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub success: Vec<String>,
    pub failed: Vec<FailedFile>,
}

/// Parse and index a list of files
///
/// Files are processed independently and sequentially so one file's
/// progress events never interleave with another's. A file's failure is
/// recorded in the report and never aborts its siblings.
pub async fn ingest_files(
    registry: &ParserRegistry,
    index: &dyn DocumentIndex,
    store: &RecordStore,
    paths: &[PathBuf],
    options: &IngestOptions,
    progress: &ProgressSink,
) -> IngestReport {
    let mut report = IngestReport::default();

    for path in paths {
        let file_name = display_name(path);
        log::info!("Ingesting: {}", file_name);

        match ingest_one(registry, index, store, path, options, progress).await {
            Ok(chunk_count) => {
                log::info!("Ingested {} ({} chunks)", file_name, chunk_count);
                report.success.push(file_name);
            }
            Err(e) => {
                log::error!("Failed to ingest {}: {}", file_name, e);
                progress.report(
                    &file_name,
                    0,
                    100,
                    ProgressStatus::Failed,
                    Some(e.to_string()),
                );
                report.failed.push(FailedFile {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Pipeline for a single file:
/// support check → parse → stamp fileId → ordered batches → persist record
async fn ingest_one(
    registry: &ParserRegistry,
    index: &dyn DocumentIndex,
    store: &RecordStore,
    path: &Path,
    options: &IngestOptions,
    progress: &ProgressSink,
) -> Result<usize> {
    let parser = registry.get_parser(path).ok_or_else(|| {
        DocdexError::UnsupportedFormat(
            path.extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| display_name(path)),
        )
    })?;

    let fid = file_id(path);

    // Parsing does blocking I/O; keep it off the event loop
    let parsed = {
        let parser = parser.clone();
        let path = path.to_path_buf();
        let parse_options = options.parse.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || parser.parse(&path, &parse_options, &progress))
            .await
            .map_err(|e| DocdexError::Parse(format!("Parser task panicked: {}", e)))??
    };

    // An all-failed or blank document is a failure, not a degenerate success
    if parsed.chunks.is_empty() {
        return Err(DocdexError::Parse(
            "Empty extraction: no content produced".to_string(),
        ));
    }

    let mut chunks = parsed.chunks;
    for chunk in &mut chunks {
        chunk.file_id = fid.clone();
    }

    let total_chunks = chunks.len();
    let file_name = parsed.file_name;

    // Batches are submitted and acknowledged strictly in order: batch N+1
    // is not sent until batch N's task resolved. Earlier acknowledged
    // batches are not rolled back when a later one fails; deterministic
    // chunk IDs make re-ingestion overwrite them.
    for (batch_no, batch) in chunks.chunks(options.batch_size).enumerate() {
        let submitted = batch_no * options.batch_size + batch.len();
        progress.report(
            &file_name,
            submitted as u64,
            total_chunks as u64,
            ProgressStatus::Indexing,
            Some(format!("Indexing {}/{} chunks...", submitted, total_chunks)),
        );
        index.index_batch(batch).await?;
    }

    // Persistence failure does not fail the file: the content is already
    // searchable, which takes priority over provenance bookkeeping
    let record = FileRecord::new(&fid, &file_name, &path.to_string_lossy());
    if let Err(e) = store.add(&record).await {
        log::warn!("Failed to save upload record for {}: {}", file_name, e);
    }

    progress.report(
        &file_name,
        total_chunks as u64,
        total_chunks as u64,
        ProgressStatus::Completed,
        Some("Indexing complete".to_string()),
    );

    Ok(total_chunks)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexStats, SearchPage, SearchParams, SearchProbe};
    use crate::parsers::{Chunk, ParsedFile, Parseable};
    use crate::progress::ParseProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Index double that records every batch it acknowledges, optionally
    /// failing the nth call.
    #[derive(Default)]
    struct RecordingIndex {
        batches: Mutex<Vec<Vec<Chunk>>>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl RecordingIndex {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Default::default()
            }
        }

        fn recorded(&self) -> Vec<Vec<Chunk>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentIndex for RecordingIndex {
        async fn ensure_index(&self) -> Result<()> {
            Ok(())
        }

        async fn index_batch(&self, chunks: &[Chunk]) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(DocdexError::IndexBatch("engine rejected batch".to_string()));
            }
            self.batches.lock().unwrap().push(chunks.to_vec());
            Ok(())
        }

        async fn delete_by_file_id(&self, _file_id: &str) -> Result<u64> {
            Ok(0)
        }

        async fn search_count(&self, query: &str, _params: &SearchParams) -> Result<SearchProbe> {
            Ok(SearchProbe {
                estimated_total_hits: 0,
                processing_time_ms: 0,
                facet_distribution: None,
                query: query.to_string(),
            })
        }

        async fn search_page(
            &self,
            _query: &str,
            _params: &SearchParams,
            _limit: usize,
            _offset: usize,
        ) -> Result<SearchPage> {
            Ok(SearchPage {
                hits: Vec::new(),
                processing_time_ms: 0,
            })
        }

        async fn stats(&self) -> Result<IndexStats> {
            Ok(IndexStats {
                number_of_documents: 0,
                is_indexing: false,
                field_distribution: Default::default(),
            })
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }

        async fn health(&self) -> bool {
            true
        }
    }

    /// Parser double producing a fixed number of chunks without disk I/O
    struct FakeParser {
        chunk_count: usize,
    }

    impl Parseable for FakeParser {
        fn extensions(&self) -> &'static [&'static str] {
            &["fake"]
        }

        fn parse(
            &self,
            path: &Path,
            _options: &ParseOptions,
            progress: &ProgressSink,
        ) -> Result<ParsedFile> {
            let file_name = display_name(path);
            let chunks = (0..self.chunk_count)
                .map(|i| Chunk {
                    id: crate::hash::chunk_id(path, i),
                    file_id: String::new(),
                    file_name: file_name.clone(),
                    file_type: "fake".to_string(),
                    content: format!("chunk {}", i),
                    page_range: None,
                    total_pages: None,
                    chunk_index: i,
                    total_chunks: self.chunk_count,
                    file_path: path.to_string_lossy().into_owned(),
                    created_at: 0,
                    metadata: None,
                })
                .collect();
            progress.report(
                &file_name,
                1,
                1,
                ProgressStatus::Completed,
                None,
            );
            Ok(ParsedFile {
                file_name,
                chunks,
                total_pages: self.chunk_count,
            })
        }
    }

    /// Parser double that always fails to load its document
    struct CorruptParser;

    impl Parseable for CorruptParser {
        fn extensions(&self) -> &'static [&'static str] {
            &["bad"]
        }

        fn parse(
            &self,
            _path: &Path,
            _options: &ParseOptions,
            _progress: &ProgressSink,
        ) -> Result<ParsedFile> {
            Err(DocdexError::Parse("corrupt document".to_string()))
        }
    }

    /// Parser double returning a successful parse with zero chunks
    struct EmptyParser;

    impl Parseable for EmptyParser {
        fn extensions(&self) -> &'static [&'static str] {
            &["empty"]
        }

        fn parse(
            &self,
            path: &Path,
            _options: &ParseOptions,
            _progress: &ProgressSink,
        ) -> Result<ParsedFile> {
            Ok(ParsedFile {
                file_name: display_name(path),
                chunks: Vec::new(),
                total_pages: 0,
            })
        }
    }

    fn test_registry(chunk_count: usize) -> ParserRegistry {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(FakeParser { chunk_count }));
        registry.register(Arc::new(CorruptParser));
        registry.register(Arc::new(EmptyParser));
        registry
    }

    async fn test_store() -> (RecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new();
        store.initialize(dir.path()).await.unwrap();
        (store, dir)
    }

    fn options(batch_size: usize) -> IngestOptions {
        IngestOptions {
            batch_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batches_submitted_in_order() {
        let registry = test_registry(250);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[PathBuf::from("/docs/big.fake")],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        assert_eq!(report.success, vec!["big.fake"]);
        let batches = index.recorded();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
        assert_eq!(batches[2].len(), 50);

        // Chunk indexes across batches are contiguous and ascending
        let indexes: Vec<usize> = batches
            .iter()
            .flatten()
            .map(|c| c.chunk_index)
            .collect();
        assert_eq!(indexes, (0..250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_chunks_stamped_with_file_id() {
        let registry = test_registry(3);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;
        let path = PathBuf::from("/docs/a.fake");

        ingest_files(
            &registry,
            &index,
            &store,
            std::slice::from_ref(&path),
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        let expected = file_id(&path);
        for chunk in index.recorded().iter().flatten() {
            assert_eq!(chunk.file_id, expected);
        }
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let registry = test_registry(2);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[
                PathBuf::from("/docs/good.fake"),
                PathBuf::from("/docs/broken.bad"),
                PathBuf::from("/docs/also-good.fake"),
            ],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        assert_eq!(report.success, vec!["good.fake", "also-good.fake"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file_name, "broken.bad");
        assert!(report.failed[0].error.contains("corrupt"));

        // Both valid files fully indexed and recorded
        assert_eq!(index.recorded().len(), 2);
        assert!(store
            .get_by_id(&file_id("/docs/good.fake"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_by_id(&file_id("/docs/also-good.fake"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_by_id(&file_id("/docs/broken.bad"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_batch_failure_skips_remaining_batches() {
        let registry = test_registry(250);
        let index = RecordingIndex::failing_on(2);
        let (store, _dir) = test_store().await;

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[PathBuf::from("/docs/big.fake")],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(report.success.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("engine rejected batch"));

        // Only the first batch was acknowledged; the third was never sent
        assert_eq!(index.recorded().len(), 1);
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);

        // Failed files get no upload record
        assert!(store
            .get_by_id(&file_id("/docs/big.fake"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unsupported_extension_has_no_side_effects() {
        let registry = test_registry(2);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[PathBuf::from("/docs/picture.png")],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(report.success.is_empty());
        assert!(report.failed[0].error.contains("Unsupported"));
        assert!(index.recorded().is_empty());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_extraction_is_a_failure() {
        let registry = test_registry(2);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[PathBuf::from("/docs/blank.empty")],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(report.success.is_empty());
        assert!(report.failed[0].error.contains("Empty extraction"));
        assert!(index.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_record_persist_failure_is_non_fatal() {
        let registry = test_registry(2);
        let index = RecordingIndex::default();
        // Store never initialized: the record write will fail
        let store = RecordStore::new();

        let report = ingest_files(
            &registry,
            &index,
            &store,
            &[PathBuf::from("/docs/a.fake")],
            &options(100),
            &ProgressSink::disabled(),
        )
        .await;

        // The content is searchable, so the file still counts as success
        assert_eq!(report.success, vec!["a.fake"]);
        assert!(report.failed.is_empty());
        assert_eq!(index.recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_progress_event_per_file() {
        let registry = test_registry(2);
        let index = RecordingIndex::default();
        let (store, _dir) = test_store().await;
        let (sink, mut rx) = ProgressSink::channel();

        ingest_files(
            &registry,
            &index,
            &store,
            &[
                PathBuf::from("/docs/a.fake"),
                PathBuf::from("/docs/b.bad"),
            ],
            &options(100),
            &sink,
        )
        .await;
        drop(sink);

        let mut events: Vec<ParseProgress> = Vec::new();
        while let Some(p) = rx.recv().await {
            events.push(p);
        }

        let last_a = events.iter().filter(|p| p.file_name == "a.fake").last().unwrap();
        assert_eq!(last_a.status, ProgressStatus::Completed);
        let last_b = events.iter().filter(|p| p.file_name == "b.bad").last().unwrap();
        assert_eq!(last_b.status, ProgressStatus::Failed);
    }
}
