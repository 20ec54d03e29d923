use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::{DocumentIndex, SearchHit, SearchParams};

/// Search request shaping on top of [`SearchParams`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Page size used when draining the full hit set
    pub batch_size: usize,
    /// Fetch every hit instead of a single bounded page
    pub fetch_all_hits: bool,
    /// Upper bound on returned hits when `fetch_all_hits` is off
    pub limit: Option<usize>,
    /// Starting offset when `fetch_all_hits` is off
    pub offset: usize,
    pub params: SearchParams,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            fetch_all_hits: true,
            limit: None,
            offset: 0,
            params: SearchParams::default(),
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            ..Self::default()
        }
    }
}

/// Aggregated outcome of one search, across probe and retrieval phases
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    pub query: String,
    pub estimated_total_hits: u64,
    /// Sum of engine processing time across all requests made
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_distribution: Option<serde_json::Value>,
}

/// Run a query in two phases: a limit-0 probe for the total hit count and
/// facet distribution, then retrieval.
///
/// With `fetch_all_hits` the probe's count drives a fixed page plan, so the
/// number of requests is known up front. A page shorter than requested ends
/// retrieval early; the engine's estimate is allowed to overshoot.
pub async fn search(
    index: &dyn DocumentIndex,
    query: &str,
    options: &SearchOptions,
) -> Result<SearchResult> {
    let probe = index.search_count(query, &options.params).await?;
    log::debug!(
        "Search '{}': {} estimated hits ({}ms probe)",
        query,
        probe.estimated_total_hits,
        probe.processing_time_ms
    );

    let mut result = SearchResult {
        hits: Vec::new(),
        query: probe.query,
        estimated_total_hits: probe.estimated_total_hits,
        processing_time_ms: probe.processing_time_ms,
        facet_distribution: probe.facet_distribution,
    };

    if probe.estimated_total_hits == 0 {
        return Ok(result);
    }

    if options.fetch_all_hits {
        let total = probe.estimated_total_hits as usize;
        let mut offset = 0;
        while offset < total {
            let limit = options.batch_size.min(total - offset);
            let page = index
                .search_page(query, &options.params, limit, offset)
                .await?;
            result.processing_time_ms += page.processing_time_ms;
            let got = page.hits.len();
            result.hits.extend(page.hits);
            if got < limit {
                break;
            }
            offset += got;
        }
    } else {
        let limit = options.limit.unwrap_or(options.batch_size);
        let page = index
            .search_page(query, &options.params, limit, options.offset)
            .await?;
        result.processing_time_ms += page.processing_time_ms;
        result.hits = page.hits;
    }

    log::debug!(
        "Search '{}' returned {} hits in {}ms",
        query,
        result.hits.len(),
        result.processing_time_ms
    );
    Ok(result)
}
