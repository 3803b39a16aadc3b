//! Vector index backend trait: the raw operations of an external index service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Metric;
use crate::error::Result;

/// Parameters an index is created with; cloud and region are passed through as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    pub region: String,
}

/// A ready index, as returned by a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    /// Index name
    pub name: String,
    /// Vector dimension of every entry
    pub dimension: usize,
    /// Similarity metric
    pub metric: Metric,
    /// Data plane host, when the service has one
    pub host: Option<String>,
}

/// Readiness report for an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub ready: bool,
    pub host: Option<String>,
    pub dimension: usize,
}

/// One entry to write: id, vector and metadata (chunk text included)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One query result, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    /// Service-reported score under the index metric
    pub score: f32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Trait for vector index services
///
/// Implementations:
/// - `PineconeBackend`: Pinecone serverless over REST
/// - `MemoryBackend`: In-process brute-force index
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Names of all existing indexes
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Delete an index and everything in it
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Create a new, empty index
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Report whether an index is ready to serve
    async fn describe_index(&self, name: &str) -> Result<IndexStatus>;

    /// Write or overwrite entries; returns the number written
    async fn upsert(&self, handle: &IndexHandle, records: &[IndexRecord]) -> Result<usize>;

    /// Up to `top_k` entries nearest to `vector`, nearest first
    async fn query(&self, handle: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>>;

    /// Number of entries stored
    async fn count(&self, handle: &IndexHandle) -> Result<usize>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
