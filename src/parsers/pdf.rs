use lopdf::Document;
use std::path::Path;

use super::{Chunk, ChunkMetadata, ParseOptions, ParsedFile, Parseable};
use crate::error::{DocdexError, Result};
use crate::hash::chunk_id;
use crate::progress::{ProgressSink, ProgressStatus};

/// PDF parser
///
/// Splits a document into page-range chunks. Each chunk covers
/// `chunk_size_pages` consecutive pages; page texts are joined with page
/// markers so search hits keep approximate page locality. Documents
/// needing more than `max_chunks` chunks are capped, not rejected: pages
/// past the cap are silently not parsed.
pub struct PdfParser;

impl Parseable for PdfParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn parse(
        &self,
        path: &Path,
        options: &ParseOptions,
        progress: &ProgressSink,
    ) -> Result<ParsedFile> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let chunk_size = options.chunk_size_pages;
        let max_chunks = options.max_chunks;

        progress.report(
            &file_name,
            0,
            100,
            ProgressStatus::Parsing,
            Some("Loading PDF document...".to_string()),
        );

        // Only a whole-document load failure is fatal
        let doc = match Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                progress.report(
                    &file_name,
                    0,
                    100,
                    ProgressStatus::Failed,
                    Some(format!("Failed to load PDF: {}", e)),
                );
                return Err(DocdexError::Parse(format!(
                    "Failed to load PDF {}: {}",
                    file_name, e
                )));
            }
        };

        let total_pages = doc.get_pages().len();
        let total_chunks = total_pages.div_ceil(chunk_size).min(max_chunks);
        let mut chunks = Vec::with_capacity(total_chunks);

        log::debug!(
            "Parsing {}: {} pages, {} chunks",
            file_name,
            total_pages,
            total_chunks
        );

        for chunk_index in 0..total_chunks {
            let start_page = chunk_index * chunk_size + 1;
            let end_page = (start_page + chunk_size - 1).min(total_pages);

            progress.report(
                &file_name,
                end_page as u64,
                total_pages as u64,
                ProgressStatus::Parsing,
                Some(format!("Parsing pages {}-{}...", start_page, end_page)),
            );

            let content = extract_page_range(&doc, start_page, end_page);

            chunks.push(Chunk {
                id: chunk_id(path, chunk_index),
                file_id: String::new(),
                file_name: file_name.clone(),
                file_type: "pdf".to_string(),
                content,
                page_range: Some(format!("{}-{}", start_page, end_page)),
                total_pages: Some(total_pages),
                chunk_index,
                total_chunks,
                file_path: path.to_string_lossy().into_owned(),
                created_at: chrono::Utc::now().timestamp_millis(),
                metadata: options.extract_metadata.then(|| ChunkMetadata {
                    pages_in_chunk: end_page - start_page + 1,
                }),
            });
        }

        progress.report(
            &file_name,
            total_pages as u64,
            total_pages as u64,
            ProgressStatus::Completed,
            Some("Parse complete".to_string()),
        );

        Ok(ParsedFile {
            file_name,
            chunks,
            total_pages,
        })
    }
}

/// Extract text for an inclusive 1-based page range
///
/// Per-page extraction failure is non-fatal: the page gets a placeholder
/// marker and parsing continues.
fn extract_page_range(doc: &Document, start_page: usize, end_page: usize) -> String {
    let mut parts = Vec::with_capacity(end_page - start_page + 1);

    for page_num in start_page..=end_page {
        match doc.extract_text(&[page_num as u32]) {
            Ok(text) => {
                parts.push(format!("\n--- Page {} ---\n{}", page_num, text.trim()));
            }
            Err(e) => {
                log::warn!("Failed to extract page {}: {}", page_num, e);
                parts.push(format!("\n--- Page {} (extraction failed) ---\n", page_num));
            }
        }
    }

    parts.join("\n").trim().to_string()
}
