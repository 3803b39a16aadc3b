//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (mxbai-embed-large)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts; output order matches input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("Embedding service returned no vector"))
    }

    /// Embedding dimensions every vector must have
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Reject a response that does not hold exactly one well-formed vector per input
pub fn validate_embeddings(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(Error::embedding(format!(
            "Expected {} embeddings, service returned {}",
            expected_count,
            vectors.len()
        )));
    }

    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(Error::embedding(format!(
                "Embedding {} has dimension {}, expected {}",
                i,
                vector.len(),
                dimensions
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::embedding(format!(
                "Embedding {} contains non-finite values",
                i
            )));
        }
    }

    Ok(vectors)
}
