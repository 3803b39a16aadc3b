//! Ollama-based providers for embeddings and chat
//!
//! Wraps the shared OllamaClient to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::Result;
use crate::generation::OllamaClient;

use super::embedding::{validate_embeddings, EmbeddingProvider};
use super::llm::{ChatMessage, LlmProvider, TextStream};

/// Ollama embedding provider, batching texts per request
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = i, size = batch.len(), model = %self.model, "Embedding batch");
            let vectors = self.client.embed_batch(&self.model, batch).await?;
            embeddings.extend(validate_embeddings(vectors, batch.len(), self.dimensions)?);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaLlm {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        self.client
            .chat_stream(&self.model, messages, self.temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Combined Ollama provider that shares a single client for both embeddings and chat
pub struct OllamaProvider {
    embedder: OllamaEmbedder,
    llm: OllamaLlm,
}

impl OllamaProvider {
    /// Create a new combined Ollama provider
    pub fn new(llm_config: &LlmConfig, embedding_config: &EmbeddingConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(llm_config)?);
        Ok(Self {
            embedder: OllamaEmbedder::from_client(Arc::clone(&client), embedding_config),
            llm: OllamaLlm::from_client(client, llm_config),
        })
    }

    /// Split into separate providers
    pub fn split(self) -> (OllamaEmbedder, OllamaLlm) {
        (self.embedder, self.llm)
    }
}
