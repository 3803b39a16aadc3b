//! Question embedding and nearest-chunk lookup

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::index::VectorIndexClient;
use crate::providers::{EmbeddingProvider, IndexHandle};
use crate::types::{PipelineState, StateUpdate};

/// Retrieves the chunks nearest to a state's question
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndexClient>,
    handle: IndexHandle,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndexClient>,
        handle: IndexHandle,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            handle,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Embed the question and return up to `top_k` chunks, nearest first
    ///
    /// The question is embedded even when empty; an empty index yields an
    /// empty context rather than an error.
    pub async fn retrieve(&self, state: &PipelineState) -> Result<StateUpdate> {
        let start = Instant::now();

        let vector = self.embedder.embed_one(&state.question).await?;
        let chunks = self.index.query(&self.handle, &vector, self.top_k).await?;

        tracing::debug!(
            index = %self.handle.name,
            top_k = self.top_k,
            found = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved context"
        );

        Ok(StateUpdate::context(chunks))
    }
}
