//! Build phase: chunk, embed and write every document into a fresh index

use std::sync::Arc;
use std::time::Instant;

use crate::config::{IndexConfig, Metric};
use crate::error::{Error, Result};
use crate::index::VectorIndexClient;
use crate::ingestion::TextChunker;
use crate::providers::{EmbeddingProvider, IndexHandle};
use crate::types::{Chunk, Document};

/// Outcome of a build
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub vectors: usize,
    /// Ready index holding every chunk
    pub handle: IndexHandle,
}

/// Runs the one-time build that must finish before any question is served
pub struct Indexer {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndexClient>,
    index_name: String,
    dimension: usize,
    metric: Metric,
}

impl Indexer {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndexClient>,
        config: &IndexConfig,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            index_name: config.name.clone(),
            dimension: config.dimension,
            metric: config.metric,
        }
    }

    /// Rebuild the index from `documents`
    ///
    /// Destroys any index with the configured name. The embedding dimension is
    /// checked against the index dimension before anything is deleted. Returns
    /// only once every written entry is visible to queries.
    pub async fn build(&self, documents: &[Document]) -> Result<IndexReport> {
        let start = Instant::now();

        let chunks = self.chunker.split(documents);
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            chunk_size = self.chunker.chunk_size(),
            overlap = self.chunker.overlap(),
            "Chunked documents"
        );

        self.check_dimension(&chunks).await?;

        let handle = self
            .index
            .ensure_clean_index(&self.index_name, self.dimension, self.metric)
            .await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }
        tracing::info!(vectors = vectors.len(), provider = self.embedder.name(), "Embedded chunks");

        let chunk_count = chunks.len();
        let entries: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        let written = self.index.upsert(&handle, &entries).await?;
        self.index.wait_until_visible(&handle, written).await?;

        tracing::info!(
            index = %handle.name,
            backend = self.index.backend_name(),
            vectors = written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index build complete"
        );

        Ok(IndexReport {
            documents: documents.len(),
            chunks: chunk_count,
            vectors: written,
            handle,
        })
    }

    /// Fail before touching the index if the embedder disagrees with its dimension
    async fn check_dimension(&self, chunks: &[Chunk]) -> Result<()> {
        let declared = self.embedder.dimensions();
        if declared != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, declared));
        }

        if let Some(first) = chunks.first() {
            let sample = self.embedder.embed_one(&first.text).await?;
            if sample.len() != self.dimension {
                return Err(Error::dimension_mismatch(self.dimension, sample.len()));
            }
        }
        Ok(())
    }
}
