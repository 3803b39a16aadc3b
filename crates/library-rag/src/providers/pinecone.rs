//! Pinecone serverless index backend
//!
//! Control plane calls (list/create/describe/delete) go to the global API;
//! data plane calls (upsert/query/stats) go to the host reported for the index.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::IndexConfig;
use crate::error::{Error, Result};

use super::vector_index::{IndexBackend, IndexHandle, IndexMatch, IndexRecord, IndexSpec, IndexStatus};

const API_VERSION: &str = "2024-07";

/// Pinecone REST client
pub struct PineconeBackend {
    client: Client,
    control_url: String,
}

impl PineconeBackend {
    /// Build a client from config; a missing or malformed API key is a configuration error
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("PINECONE_API_KEY is not set"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| Error::config("PINECONE_API_KEY contains invalid characters"))?,
        );
        headers.insert("x-pinecone-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Pinecone HTTP client: {}", e)))?;

        Ok(Self {
            client,
            control_url: config.control_url.trim_end_matches('/').to_string(),
        })
    }

    fn data_url(handle: &IndexHandle, path: &str) -> Result<String> {
        let host = handle
            .host
            .as_deref()
            .ok_or_else(|| Error::index(format!("Index '{}' has no data plane host", handle.name)))?;
        Ok(format!("{}{}", data_host(host), path))
    }

    /// Map transport failures and non-success statuses to `IndexUnavailable`
    async fn check(result: reqwest::Result<Response>, action: &str) -> Result<Response> {
        let response = result.map_err(|e| Error::index(format!("{} failed: {}", action, e)))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(Error::index(format!("{} failed: HTTP {} - {}", action, status, body)))
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: Response, action: &str) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::index(format!("Failed to parse {} response: {}", action, e)))
    }
}

/// Hosts are reported without a scheme
fn data_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexModelStatus>,
}

#[derive(Deserialize)]
struct IndexModelStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: ServerlessSpecWrapper<'a>,
    deletion_protection: &'a str,
}

#[derive(Serialize)]
struct ServerlessSpecWrapper<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: usize,
}

#[async_trait]
impl IndexBackend for PineconeBackend {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.control_url);
        let response = Self::check(self.client.get(&url).send().await, "List indexes").await?;
        let list: IndexList = Self::parse(response, "list indexes").await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let url = format!("{}/indexes/{}", self.control_url, name);
        let result = self.client.delete(&url).send().await;
        if let Ok(response) = &result {
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(());
            }
        }
        Self::check(result, "Delete index").await?;
        Ok(())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let url = format!("{}/indexes", self.control_url);
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric.as_str(),
            spec: ServerlessSpecWrapper {
                serverless: ServerlessSpec {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
            deletion_protection: "disabled",
        };
        Self::check(self.client.post(&url).json(&request).send().await, "Create index").await?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexStatus> {
        let url = format!("{}/indexes/{}", self.control_url, name);
        let response = Self::check(self.client.get(&url).send().await, "Describe index").await?;
        let model: IndexModel = Self::parse(response, "describe index").await?;

        Ok(IndexStatus {
            ready: model.status.map(|s| s.ready).unwrap_or(false),
            host: model.host.filter(|h| !h.is_empty()),
            dimension: model.dimension,
        })
    }

    async fn upsert(&self, handle: &IndexHandle, records: &[IndexRecord]) -> Result<usize> {
        let url = Self::data_url(handle, "/vectors/upsert")?;
        let request = UpsertRequest { vectors: records };
        let response = Self::check(self.client.post(&url).json(&request).send().await, "Upsert").await?;
        let parsed: UpsertResponse = Self::parse(response, "upsert").await?;
        Ok(parsed.upserted_count)
    }

    async fn query(&self, handle: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let url = Self::data_url(handle, "/query")?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response = Self::check(self.client.post(&url).json(&request).send().await, "Query").await?;
        let parsed: QueryResponse = Self::parse(response, "query").await?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| IndexMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn count(&self, handle: &IndexHandle) -> Result<usize> {
        let url = Self::data_url(handle, "/describe_index_stats")?;
        let response = Self::check(
            self.client.post(&url).json(&serde_json::json!({})).send().await,
            "Describe index stats",
        )
        .await?;
        let stats: StatsResponse = Self::parse(response, "index stats").await?;
        Ok(stats.total_vector_count)
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Metric;

    #[test]
    fn test_requires_api_key() {
        let config = IndexConfig::default();
        assert!(matches!(PineconeBackend::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_data_host_adds_scheme() {
        assert_eq!(
            data_host("the-library-abc123.svc.aped-4627-b74a.pinecone.io"),
            "https://the-library-abc123.svc.aped-4627-b74a.pinecone.io"
        );
        assert_eq!(data_host("http://localhost:5081/"), "http://localhost:5081");
    }

    #[test]
    fn test_create_request_passes_spec_through() {
        let request = CreateIndexRequest {
            name: "the-library",
            dimension: 1024,
            metric: Metric::Cosine.as_str(),
            spec: ServerlessSpecWrapper {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: "us-east-1",
                },
            },
            deletion_protection: "disabled",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "the-library",
                "dimension": 1024,
                "metric": "cosine",
                "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } },
                "deletion_protection": "disabled"
            })
        );
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let vector = [0.5f32, 0.25];
        let json = serde_json::to_value(QueryRequest {
            vector: &vector,
            top_k: 4,
            include_metadata: true,
            include_values: false,
        })
        .unwrap();

        assert_eq!(json["topK"], 4);
        assert_eq!(json["includeMetadata"], true);
    }

    #[test]
    fn test_describe_response_parses_readiness() {
        let model: IndexModel = serde_json::from_str(
            r#"{
                "name": "the-library",
                "dimension": 1024,
                "metric": "cosine",
                "host": "the-library-abc.svc.pinecone.io",
                "status": { "ready": true, "state": "Ready" }
            }"#,
        )
        .unwrap();

        assert!(model.status.unwrap().ready);
        assert_eq!(model.dimension, 1024);
        assert_eq!(model.host.as_deref(), Some("the-library-abc.svc.pinecone.io"));
    }

    #[test]
    fn test_data_url_requires_host() {
        let handle = IndexHandle {
            name: "the-library".to_string(),
            dimension: 4,
            metric: Metric::Cosine,
            host: None,
        };
        assert!(matches!(
            PineconeBackend::data_url(&handle, "/query"),
            Err(Error::IndexUnavailable(_))
        ));
    }
}
