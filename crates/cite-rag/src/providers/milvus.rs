//! Milvus v2 REST client: vector search, page-range fetch and text sampling

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::MilvusConfig;
use crate::error::{Error, Result};
use crate::types::{PageChunk, SearchHit};

use super::vector_store::{CollectionSampler, PageFetcher, VectorStore};

/// Milvus client for pre-populated collections.
///
/// Entities are expected to carry a text field, an integer page field and a
/// source-document field; field names come from [`MilvusConfig`].
pub struct MilvusClient {
    client: Client,
    config: MilvusConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    collection_name: &'a str,
    data: Vec<&'a [f32]>,
    anns_field: &'a str,
    limit: usize,
    output_fields: Vec<&'a str>,
    search_params: SearchParams<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams<'a> {
    metric_type: &'a str,
    params: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    collection_name: &'a str,
    filter: String,
    output_fields: Vec<&'a str>,
    limit: usize,
}

#[derive(Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

impl MilvusClient {
    pub fn new(config: MilvusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST a request body and unwrap Milvus' `{code, message, data}` envelope
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Vec<Map<String, Value>>> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::vector_store(format!("Milvus request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_store(format!(
                "Milvus HTTP {}: {}",
                status, body
            )));
        }

        let parsed: MilvusResponse = response
            .json()
            .await
            .map_err(|e| Error::vector_store(format!("Failed to parse Milvus response: {}", e.without_url())))?;

        if parsed.code != 0 {
            return Err(Error::vector_store(format!(
                "Milvus error {}: {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }

        Ok(parsed.data)
    }

    fn text_of(&self, row: &Map<String, Value>) -> String {
        row.get(&self.config.text_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn page_of(&self, row: &Map<String, Value>) -> u32 {
        page_value(row.get(&self.config.page_field))
    }

    fn source_of(&self, row: &Map<String, Value>) -> String {
        row.get(&self.config.source_field)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    }
}

/// Pages may be stored as integers or numeric strings; anything else is page 0
fn page_value(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u32::try_from(p).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Milvus boolean expression selecting one source's pages in `[page_min, page_max]`
pub fn page_range_filter(
    source_field: &str,
    page_field: &str,
    source: &str,
    page_min: u32,
    page_max: u32,
) -> String {
    let escaped = source.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "{} == \"{}\" && {} >= {} && {} <= {}",
        source_field, escaped, page_field, page_min, page_field, page_max
    )
}

#[async_trait]
impl VectorStore for MilvusClient {
    async fn search(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let request = SearchRequest {
            collection_name: collection_id,
            data: vec![query_embedding],
            anns_field: &self.config.anns_field,
            limit: k,
            output_fields: vec![
                self.config.text_field.as_str(),
                self.config.page_field.as_str(),
                self.config.source_field.as_str(),
            ],
            search_params: SearchParams {
                metric_type: &self.config.metric_type,
                params: serde_json::json!({ "nprobe": self.config.nprobe }),
            },
        };

        let rows = self.post("/v2/vectordb/entities/search", &request).await?;

        let hits = rows
            .iter()
            .enumerate()
            .map(|(rank, row)| SearchHit {
                collection_id: collection_id.to_string(),
                text: self.text_of(row),
                page: self.page_of(row),
                source: self.source_of(row),
                distance: row
                    .get("distance")
                    .and_then(Value::as_f64)
                    .map(|d| d as f32)
                    .unwrap_or(f32::NAN),
                rank,
            })
            .collect::<Vec<_>>();

        tracing::debug!("Milvus search on '{}': {} hits", collection_id, hits.len());
        Ok(hits)
    }

    fn name(&self) -> &str {
        "milvus"
    }
}

#[async_trait]
impl PageFetcher for MilvusClient {
    async fn fetch_pages(
        &self,
        collection_id: &str,
        source: &str,
        page_min: u32,
        page_max: u32,
    ) -> Result<Vec<PageChunk>> {
        let request = QueryRequest {
            collection_name: collection_id,
            filter: page_range_filter(
                &self.config.source_field,
                &self.config.page_field,
                source,
                page_min,
                page_max,
            ),
            output_fields: vec![self.config.text_field.as_str(), self.config.page_field.as_str()],
            limit: self.config.max_page_chunks,
        };

        let rows = self
            .post("/v2/vectordb/entities/query", &request)
            .await
            .map_err(|e| Error::page_fetch(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| PageChunk {
                page: self.page_of(row),
                text: self.text_of(row),
            })
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect())
    }
}

#[async_trait]
impl CollectionSampler for MilvusClient {
    async fn sample_texts(&self, collection_id: &str, limit: usize) -> Result<Vec<String>> {
        let request = QueryRequest {
            collection_name: collection_id,
            filter: "id >= 0".to_string(),
            output_fields: vec![self.config.text_field.as_str()],
            limit,
        };

        let rows = self.post("/v2/vectordb/entities/query", &request).await?;
        Ok(rows.iter().map(|row| self.text_of(row)).collect())
    }
}
