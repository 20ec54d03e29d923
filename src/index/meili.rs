use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{DocumentIndex, IndexStats, SearchHit, SearchPage, SearchParams, SearchProbe};
use crate::config::{IndexingConfig, SearchConfig};
use crate::error::{DocdexError, Result};
use crate::parsers::Chunk;

/// Attributes matched against the query text
const SEARCHABLE_ATTRIBUTES: &[&str] = &["fileName", "content", "filePath"];
/// Attributes usable in filter expressions (fileId drives bulk deletion)
const FILTERABLE_ATTRIBUTES: &[&str] = &["fileType", "createdAt", "fileId"];
const SORTABLE_ATTRIBUTES: &[&str] = &["createdAt", "fileName"];

/// Attributes returned for every hit; content is added on request
const RETRIEVED_ATTRIBUTES: &[&str] = &[
    "id",
    "fileId",
    "fileName",
    "fileType",
    "pageRange",
    "totalPages",
    "chunkIndex",
    "totalChunks",
    "filePath",
    "createdAt",
];

/// Handle for an asynchronous engine task
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRef {
    task_uid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: TaskStatus,
    error: Option<TaskError>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    uid: &'a str,
    #[serde(rename = "primaryKey")]
    primary_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexSettings {
    searchable_attributes: Vec<&'static str>,
    filterable_attributes: Vec<&'static str>,
    sortable_attributes: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct DeleteByFilterRequest<'a> {
    filter: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    q: &'a str,
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    facets: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes_to_retrieve: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes_to_crop: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop_marker: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes_to_highlight: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight_pre_tag: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight_post_tag: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    show_matches_position: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchResponse {
    hits: Vec<SearchHit>,
    #[serde(default)]
    estimated_total_hits: Option<u64>,
    #[serde(default)]
    processing_time_ms: u64,
    #[serde(default)]
    facet_distribution: Option<serde_json::Value>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Typed client for the engine's document/search/task REST API
///
/// Built once and shared behind an `Arc`; holds no per-request state.
pub struct MeiliIndexClient {
    client: Client,
    base_url: String,
    index_uid: String,
    master_key: String,
    task_timeout: Duration,
    task_poll_interval: Duration,
    crop_length: usize,
}

impl MeiliIndexClient {
    pub fn new(
        base_url: &str,
        master_key: &str,
        index_uid: &str,
        indexing: &IndexingConfig,
        search: &SearchConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DocdexError::Engine(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_uid: index_uid.to_string(),
            master_key: master_key.to_string(),
            task_timeout: Duration::from_millis(indexing.task_timeout_ms),
            task_poll_interval: Duration::from_millis(indexing.task_poll_interval_ms),
            crop_length: search.crop_length,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.master_key))
    }

    /// Map a non-success response into an Engine error with the body text
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(DocdexError::Engine(format!(
            "Engine API error {}: {}",
            status, body
        )))
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let response = self
            .authorized(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| DocdexError::Engine(format!("Network error: {}", e)))?;
        self.check(response).await
    }

    async fn send_json<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let response = self
            .authorized(self.client.request(method, self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| DocdexError::Engine(format!("Network error: {}", e)))?;
        self.check(response).await
    }

    /// Poll a task until it reaches a terminal state or the bounded wait
    /// expires. A failed task surfaces the engine's error message.
    async fn wait_for_task(&self, task_uid: u64) -> Result<()> {
        let start = Instant::now();
        loop {
            let task: Task = self
                .get(&format!("/tasks/{}", task_uid))
                .await?
                .json()
                .await
                .map_err(|e| DocdexError::Engine(format!("Failed to parse task: {}", e)))?;

            match task.status {
                TaskStatus::Succeeded => return Ok(()),
                TaskStatus::Failed | TaskStatus::Canceled => {
                    let message = task
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown engine error".to_string());
                    return Err(DocdexError::IndexBatch(format!(
                        "Task {} failed: {}",
                        task_uid, message
                    )));
                }
                TaskStatus::Enqueued | TaskStatus::Processing => {
                    if start.elapsed() >= self.task_timeout {
                        return Err(DocdexError::IndexBatch(format!(
                            "Task {} did not complete within {:?}",
                            task_uid, self.task_timeout
                        )));
                    }
                    tokio::time::sleep(self.task_poll_interval).await;
                }
            }
        }
    }

    async fn submit_and_wait(&self, response: Response, what: &str) -> Result<()> {
        let task: TaskRef = response
            .json()
            .await
            .map_err(|e| DocdexError::Engine(format!("Failed to parse task ref: {}", e)))?;
        log::debug!("{} submitted as task {}", what, task.task_uid);
        self.wait_for_task(task.task_uid).await
    }

    async fn search_raw(&self, request: &SearchRequest<'_>) -> Result<RawSearchResponse> {
        let path = format!("/indexes/{}/search", self.index_uid);
        let response = self
            .send_json(reqwest::Method::POST, &path, request)
            .await?;
        response
            .json()
            .await
            .map_err(|e| DocdexError::Engine(format!("Failed to parse search response: {}", e)))
    }

    fn base_request<'a>(&self, query: &'a str, params: &'a SearchParams) -> SearchRequest<'a> {
        SearchRequest {
            q: query,
            limit: 0,
            offset: 0,
            filter: params.filter.as_deref(),
            sort: params.sort.as_deref(),
            facets: None,
            attributes_to_retrieve: None,
            attributes_to_crop: None,
            crop_length: None,
            crop_marker: None,
            attributes_to_highlight: None,
            highlight_pre_tag: None,
            highlight_post_tag: None,
            show_matches_position: None,
        }
    }
}

#[async_trait]
impl DocumentIndex for MeiliIndexClient {
    async fn ensure_index(&self) -> Result<()> {
        // Existence check; 404 means the index must be created first
        let path = format!("/indexes/{}", self.index_uid);
        let response = self
            .authorized(self.client.get(self.url(&path)))
            .send()
            .await
            .map_err(|e| DocdexError::Engine(format!("Network error: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            log::info!("Creating index: {}", self.index_uid);
            let create = CreateIndexRequest {
                uid: &self.index_uid,
                primary_key: "id",
            };
            let response = self
                .send_json(reqwest::Method::POST, "/indexes", &create)
                .await?;
            self.submit_and_wait(response, "Index creation").await?;
        } else {
            self.check(response).await?;
            log::debug!("Index exists: {}", self.index_uid);
        }

        // (Re)apply attribute settings on every startup
        let settings = IndexSettings {
            searchable_attributes: SEARCHABLE_ATTRIBUTES.to_vec(),
            filterable_attributes: FILTERABLE_ATTRIBUTES.to_vec(),
            sortable_attributes: SORTABLE_ATTRIBUTES.to_vec(),
        };
        let path = format!("/indexes/{}/settings", self.index_uid);
        let response = self
            .send_json(reqwest::Method::PATCH, &path, &settings)
            .await?;
        self.submit_and_wait(response, "Settings update").await?;

        log::info!("Index configured: {}", self.index_uid);
        Ok(())
    }

    async fn index_batch(&self, chunks: &[Chunk]) -> Result<()> {
        let path = format!("/indexes/{}/documents?primaryKey=id", self.index_uid);
        let response = self
            .send_json(reqwest::Method::POST, &path, &chunks)
            .await?;
        self.submit_and_wait(response, "Document batch").await
    }

    async fn delete_by_file_id(&self, file_id: &str) -> Result<u64> {
        let filter = format!("fileId = \"{}\"", file_id);

        // Probe first so the caller learns how many chunks went away
        let params = SearchParams {
            filter: Some(filter.clone()),
            ..Default::default()
        };
        let count = self.search_count("", &params).await?.estimated_total_hits;

        let path = format!("/indexes/{}/documents/delete", self.index_uid);
        let request = DeleteByFilterRequest { filter: &filter };
        let response = self
            .send_json(reqwest::Method::POST, &path, &request)
            .await?;
        self.submit_and_wait(response, "Filter delete").await?;

        log::debug!("Deleted {} chunks for fileId {}", count, file_id);
        Ok(count)
    }

    async fn search_count(&self, query: &str, params: &SearchParams) -> Result<SearchProbe> {
        let mut request = self.base_request(query, params);
        request.facets = Some(vec!["fileId"]);

        let raw = self.search_raw(&request).await?;
        Ok(SearchProbe {
            estimated_total_hits: raw.estimated_total_hits.unwrap_or(0),
            processing_time_ms: raw.processing_time_ms,
            facet_distribution: raw.facet_distribution,
            query: raw.query.unwrap_or_else(|| query.to_string()),
        })
    }

    async fn search_page(
        &self,
        query: &str,
        params: &SearchParams,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        let mut retrieve = RETRIEVED_ATTRIBUTES.to_vec();
        if params.include_content {
            retrieve.push("content");
        }

        let mut request = self.base_request(query, params);
        request.limit = limit;
        request.offset = offset;
        request.attributes_to_retrieve = Some(retrieve);
        request.attributes_to_crop = Some(vec!["content"]);
        request.crop_length = Some(self.crop_length);
        request.crop_marker = Some("...");
        request.attributes_to_highlight = Some(vec!["content", "fileName"]);
        request.highlight_pre_tag = Some("<mark>");
        request.highlight_post_tag = Some("</mark>");
        request.show_matches_position = Some(true);

        let raw = self.search_raw(&request).await?;
        Ok(SearchPage {
            hits: raw.hits,
            processing_time_ms: raw.processing_time_ms,
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let path = format!("/indexes/{}/stats", self.index_uid);
        self.get(&path)
            .await?
            .json()
            .await
            .map_err(|e| DocdexError::Engine(format!("Failed to parse stats: {}", e)))
    }

    async fn clear(&self) -> Result<()> {
        let path = format!("/indexes/{}/documents", self.index_uid);
        let response = self
            .authorized(self.client.delete(self.url(&path)))
            .send()
            .await
            .map_err(|e| DocdexError::Engine(format!("Network error: {}", e)))?;
        let response = self.check(response).await?;
        self.submit_and_wait(response, "Index clear").await
    }

    async fn health(&self) -> bool {
        let response = self.client.get(self.url("/health")).send().await;
        match response {
            Ok(r) if r.status().is_success() => r
                .json::<HealthResponse>()
                .await
                .map(|h| h.status == "available")
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MeiliIndexClient {
        MeiliIndexClient::new(
            "http://127.0.0.1:7700/",
            "test-key",
            "documents",
            &IndexingConfig::default(),
            &SearchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let c = client();
        assert_eq!(
            c.url("/indexes/documents"),
            "http://127.0.0.1:7700/indexes/documents"
        );
    }

    #[test]
    fn test_search_request_wire_names() {
        let c = client();
        let params = SearchParams {
            filter: Some("fileId = \"abc\"".to_string()),
            ..Default::default()
        };
        let mut request = c.base_request("hello", &params);
        request.limit = 500;
        request.offset = 1000;
        request.crop_length = Some(50);
        request.show_matches_position = Some(true);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["q"], "hello");
        assert_eq!(json["limit"], 500);
        assert_eq!(json["offset"], 1000);
        assert_eq!(json["filter"], "fileId = \"abc\"");
        assert_eq!(json["cropLength"], 50);
        assert_eq!(json["showMatchesPosition"], true);
        // Unset optionals must not be serialized at all
        assert!(json.get("facets").is_none());
        assert!(json.get("sort").is_none());
    }

    #[test]
    fn test_task_deserialization() {
        let task: Task = serde_json::from_str(
            r#"{"uid": 7, "status": "failed", "error": {"message": "invalid document id"}}"#,
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.unwrap().message, "invalid document id");

        let task: Task = serde_json::from_str(r#"{"uid": 8, "status": "succeeded"}"#).unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert!(task.error.is_none());
    }

    #[test]
    fn test_search_response_deserialization() {
        let raw: RawSearchResponse = serde_json::from_str(
            r#"{
                "hits": [{"id": "abc_chunk_0", "fileId": "abc", "fileName": "a.pdf",
                          "fileType": "pdf", "chunkIndex": 0, "filePath": "/docs/a.pdf",
                          "createdAt": 1700000000000,
                          "_formatted": {"content": "...<mark>hit</mark>..."}}],
                "estimatedTotalHits": 1200,
                "processingTimeMs": 12,
                "query": "hit",
                "facetDistribution": {"fileId": {"abc": 1200}}
            }"#,
        )
        .unwrap();
        assert_eq!(raw.estimated_total_hits, Some(1200));
        assert_eq!(raw.processing_time_ms, 12);
        assert_eq!(raw.hits.len(), 1);
        assert_eq!(raw.hits[0].id, "abc_chunk_0");
        assert!(raw.hits[0].formatted.is_some());
    }

    #[test]
    fn test_settings_wire_names() {
        let settings = IndexSettings {
            searchable_attributes: SEARCHABLE_ATTRIBUTES.to_vec(),
            filterable_attributes: FILTERABLE_ATTRIBUTES.to_vec(),
            sortable_attributes: SORTABLE_ATTRIBUTES.to_vec(),
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            json["searchableAttributes"],
            serde_json::json!(["fileName", "content", "filePath"])
        );
        assert_eq!(
            json["filterableAttributes"],
            serde_json::json!(["fileType", "createdAt", "fileId"])
        );
    }
}
