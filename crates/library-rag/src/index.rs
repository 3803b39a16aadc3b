//! Vector index client: full rebuild, batched upsert and similarity query
//!
//! Rebuilding is destructive. `ensure_clean_index` drops any index with the
//! same name before creating an empty one, so every run is a full reindex and
//! previously indexed data under that name is lost.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::{IndexBackendKind, IndexConfig, Metric};
use crate::error::{Error, Result};
use crate::providers::vector_index::{IndexBackend, IndexHandle, IndexRecord, IndexSpec};
use crate::providers::{MemoryBackend, PineconeBackend};
use crate::types::Chunk;

/// Client wrapping an index backend with the pipeline's rebuild policy
pub struct VectorIndexClient {
    backend: Arc<dyn IndexBackend>,
    /// Serverless placement, passed through unmodified
    cloud: String,
    region: String,
    upsert_batch_size: usize,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl VectorIndexClient {
    pub fn new(backend: Arc<dyn IndexBackend>, config: &IndexConfig) -> Self {
        Self {
            backend,
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            upsert_batch_size: config.upsert_batch_size.max(1),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            poll_interval: Duration::from_millis(config.ready_poll_ms.max(1)),
        }
    }

    /// Build the client for the backend the config selects
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let backend: Arc<dyn IndexBackend> = match config.backend {
            IndexBackendKind::Pinecone => Arc::new(PineconeBackend::new(config)?),
            IndexBackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Ok(Self::new(backend, config))
    }

    /// Override readiness timing
    pub fn with_readiness(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.ready_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Drop any index called `name`, create an empty one and wait until it is ready
    pub async fn ensure_clean_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<IndexHandle> {
        if dimension == 0 {
            return Err(Error::config("Index dimension must be greater than 0"));
        }

        let existing = self.backend.list_indexes().await?;
        if existing.iter().any(|n| n == name) {
            tracing::warn!(index = name, "Index exists, deleting it and all of its entries");
            self.backend.delete_index(name).await?;
            self.wait_until_deleted(name).await?;
            tracing::info!(index = name, "Index deleted");
        }

        let spec = IndexSpec {
            name: name.to_string(),
            dimension,
            metric,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        };
        tracing::info!(index = name, dimension, metric = metric.as_str(), "Creating new index");
        self.backend.create_index(&spec).await?;

        let handle = self.wait_until_ready(&spec).await?;
        tracing::info!(index = name, backend = self.backend.name(), "Index ready");
        Ok(handle)
    }

    async fn wait_until_deleted(&self, name: &str) -> Result<()> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            if !self.backend.list_indexes().await?.iter().any(|n| n == name) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::index(format!(
                    "Index '{}' still present {:?} after deletion",
                    name, self.ready_timeout
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_until_ready(&self, spec: &IndexSpec) -> Result<IndexHandle> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let status = self.backend.describe_index(&spec.name).await?;
            if status.ready {
                if status.dimension != 0 && status.dimension != spec.dimension {
                    return Err(Error::dimension_mismatch(spec.dimension, status.dimension));
                }
                return Ok(IndexHandle {
                    name: spec.name.clone(),
                    dimension: spec.dimension,
                    metric: spec.metric,
                    host: status.host,
                });
            }
            if Instant::now() >= deadline {
                return Err(Error::index(format!(
                    "Index '{}' not ready after {:?}",
                    spec.name, self.ready_timeout
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Write chunk/vector pairs in batches; re-upserting the same chunk overwrites it
    pub async fn upsert(&self, handle: &IndexHandle, entries: &[(Chunk, Vec<f32>)]) -> Result<usize> {
        let records = entries
            .iter()
            .map(|(chunk, vector)| {
                if vector.len() != handle.dimension {
                    return Err(Error::dimension_mismatch(handle.dimension, vector.len()));
                }
                Ok(IndexRecord {
                    id: chunk.id.to_string(),
                    values: vector.clone(),
                    metadata: chunk.to_index_metadata(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut written = 0usize;
        for batch in records.chunks(self.upsert_batch_size) {
            written += self.backend.upsert(handle, batch).await?;
            tracing::debug!(index = %handle.name, batch = batch.len(), written, "Upserted batch");
        }

        tracing::info!(index = %handle.name, entries = records.len(), "Upsert complete");
        Ok(written)
    }

    /// Block until the index reports at least `expected` entries
    ///
    /// Writes to a serverless index become visible to reads after a delay.
    pub async fn wait_until_visible(&self, handle: &IndexHandle, expected: usize) -> Result<()> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let count = self.backend.count(handle).await?;
            if count >= expected {
                tracing::debug!(index = %handle.name, count, "Entries visible");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::index(format!(
                    "Index '{}' shows {} of {} entries after {:?}",
                    handle.name, count, expected, self.ready_timeout
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Up to `k` chunks nearest to `vector`, nearest first
    pub async fn query(&self, handle: &IndexHandle, vector: &[f32], k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let matches = self.backend.query(handle, vector, k).await?;
        let mut chunks = Vec::with_capacity(matches.len());

        for m in matches.into_iter().take(k) {
            match Chunk::from_index_metadata(&m.id, &m.metadata) {
                Some(chunk) => {
                    tracing::debug!(id = %m.id, score = m.score, "Retrieved chunk");
                    chunks.push(chunk);
                }
                None => tracing::warn!(id = %m.id, "Index entry has no chunk text, skipping"),
            }
        }

        Ok(chunks)
    }

    /// Number of entries in the index
    pub async fn count(&self, handle: &IndexHandle) -> Result<usize> {
        self.backend.count(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = IndexConfig::default();
        config.backend = IndexBackendKind::Memory;
        assert_eq!(VectorIndexClient::from_config(&config).unwrap().backend_name(), "memory");

        config.backend = IndexBackendKind::Pinecone;
        config.api_key = None;
        assert!(matches!(VectorIndexClient::from_config(&config), Err(Error::Config(_))));
    }

    fn client(backend: MemoryBackend) -> VectorIndexClient {
        VectorIndexClient::new(Arc::new(backend), &IndexConfig::default())
            .with_readiness(Duration::from_millis(200), Duration::from_millis(1))
    }

    fn entries() -> Vec<(Chunk, Vec<f32>)> {
        let doc = Document::new("colors.txt", "The sky is blue. The grass is green.");
        vec![
            (Chunk::new(&doc, "The sky is blue. ".to_string(), 0, 0, 17), vec![1.0, 0.0, 0.0]),
            (Chunk::new(&doc, "The grass is green.".to_string(), 1, 17, 36), vec![0.0, 1.0, 0.0]),
        ]
    }

    #[tokio::test]
    async fn test_rebuild_twice_leaves_empty_index() {
        let client = client(MemoryBackend::new());

        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        assert_eq!(client.count(&handle).await.unwrap(), 0);
        client.upsert(&handle, &entries()).await.unwrap();
        assert_eq!(client.count(&handle).await.unwrap(), 2);

        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        assert_eq!(client.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exact_vector_returns_chunk_first() {
        let client = client(MemoryBackend::new());
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        let entries = entries();
        client.upsert(&handle, &entries).await.unwrap();

        for (chunk, vector) in &entries {
            let results = client.query(&handle, vector, 2).await.unwrap();
            assert_eq!(&results[0], chunk);
        }
    }

    #[tokio::test]
    async fn test_query_returns_at_most_k() {
        let client = client(MemoryBackend::new());
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        client.upsert(&handle, &entries()).await.unwrap();

        assert_eq!(client.query(&handle, &[1.0, 1.0, 0.0], 1).await.unwrap().len(), 1);
        assert_eq!(client.query(&handle, &[1.0, 1.0, 0.0], 10).await.unwrap().len(), 2);
        assert!(client.query(&handle, &[1.0, 1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let client = client(MemoryBackend::new());
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();

        client.upsert(&handle, &entries()).await.unwrap();
        client.upsert(&handle, &entries()).await.unwrap();
        assert_eq!(client.count(&handle).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_batches() {
        let mut config = IndexConfig::default();
        config.upsert_batch_size = 1;
        let client = VectorIndexClient::new(Arc::new(MemoryBackend::new()), &config);
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();

        assert_eq!(client.upsert(&handle, &entries()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let client = client(MemoryBackend::new());
        let handle = client.ensure_clean_index("library", 4, Metric::Cosine).await.unwrap();

        let err = client.upsert(&handle, &entries()).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[tokio::test]
    async fn test_waits_for_readiness() {
        let client = client(MemoryBackend::with_ready_after(3));
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        assert_eq!(handle.name, "library");
    }

    #[tokio::test]
    async fn test_readiness_timeout_is_index_unavailable() {
        let client = VectorIndexClient::new(Arc::new(MemoryBackend::never_ready()), &IndexConfig::default())
            .with_readiness(Duration::from_millis(20), Duration::from_millis(2));

        let err = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_waits_until_entries_visible() {
        let client = client(MemoryBackend::with_count_lag(3));
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        let written = client.upsert(&handle, &entries()).await.unwrap();

        client.wait_until_visible(&handle, written).await.unwrap();
        assert_eq!(client.count(&handle).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invisible_entries_time_out() {
        let client = VectorIndexClient::new(Arc::new(MemoryBackend::with_count_lag(usize::MAX)), &IndexConfig::default())
            .with_readiness(Duration::from_millis(20), Duration::from_millis(2));
        let handle = client.ensure_clean_index("library", 3, Metric::Cosine).await.unwrap();
        client.upsert(&handle, &entries()).await.unwrap();

        let err = client.wait_until_visible(&handle, 2).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_zero_dimension_is_config_error() {
        let client = client(MemoryBackend::new());
        assert!(matches!(
            client.ensure_clean_index("library", 0, Metric::Cosine).await,
            Err(Error::Config(_))
        ));
    }
}
