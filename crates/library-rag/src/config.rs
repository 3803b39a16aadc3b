//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Document discovery configuration
    pub ingest: IngestConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama chat model configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub index: IndexConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration: defaults, then an optional TOML file, then environment.
    ///
    /// `.env` in the working directory is read first so credentials kept
    /// there are visible to the environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "Loaded .env");
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML configuration file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("Invalid config: {}", e)))
    }

    /// Override fields from the process environment
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            if !key.trim().is_empty() {
                self.index.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                self.llm.base_url = normalize_ollama_host(host.trim());
            }
        }
    }

    /// Check every constraint that must hold before any service is contacted
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than 0"));
        }
        if self.index.upsert_batch_size == 0 {
            return Err(Error::config("index.upsert_batch_size must be greater than 0"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        if self.index.name.trim().is_empty() {
            return Err(Error::config("index.name must not be empty"));
        }
        if self.index.backend == IndexBackendKind::Pinecone && self.index.api_key.is_none() {
            return Err(Error::config(
                "PINECONE_API_KEY is not set (required for the pinecone index backend)",
            ));
        }
        if self.embeddings.dimensions != self.index.dimension {
            return Err(Error::dimension_mismatch(
                self.index.dimension,
                self.embeddings.dimensions,
            ));
        }

        Ok(())
    }
}

/// `OLLAMA_HOST` may be given without a scheme (`127.0.0.1:11434`)
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Document discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root directory searched recursively for documents
    pub contexts_dir: PathBuf,
    /// Glob (relative to `contexts_dir`) selecting which files become documents
    pub glob: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            contexts_dir: PathBuf::from("./contexts"),
            glob: "**/*.txt".to_string(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Separators tried coarsest first; character splitting is the implicit last resort
    pub separators: Vec<String>,
}

impl ChunkingConfig {
    /// `chunk_overlap < chunk_size` is required
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.iter().any(|s| s.is_empty()) {
            return Err(Error::config("chunking.separators must not contain empty strings"));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: default_separators(),
        }
    }
}

/// Paragraph, line, sentence, word
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", "? ", "! ", " "]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model
    pub model: String,
    /// Embedding dimensions (1024 for mxbai-embed-large)
    pub dimensions: usize,
    /// Texts sent per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
            batch_size: 32,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Chat model name
    pub chat_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout in seconds: whole request for embeddings, longest silence for chat streams
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Which vector index service backs the pipeline
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackendKind {
    /// Pinecone serverless index
    #[default]
    Pinecone,
    /// In-process index, nothing leaves the machine
    Memory,
}

impl std::str::FromStr for IndexBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(Self::Pinecone),
            "memory" => Ok(Self::Memory),
            other => Err(Error::config(format!(
                "Unknown index backend '{}'; use pinecone or memory",
                other
            ))),
        }
    }
}

/// Similarity metric of the index
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dotproduct,
    Euclidean,
}

impl Metric {
    /// Wire name used by the index service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dotproduct => "dotproduct",
            Self::Euclidean => "euclidean",
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Backend service
    pub backend: IndexBackendKind,
    /// Index name; rebuilt from scratch on every run
    pub name: String,
    /// Vector dimension the index is created with
    pub dimension: usize,
    /// Similarity metric
    pub metric: Metric,
    /// Serverless cloud, passed through unmodified
    pub cloud: String,
    /// Serverless region, passed through unmodified
    pub region: String,
    /// API key (usually from `PINECONE_API_KEY`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Control plane base URL
    pub control_url: String,
    /// Vectors per upsert request
    pub upsert_batch_size: usize,
    /// Upper bound on waiting for a new index to report ready
    pub ready_timeout_secs: u64,
    /// Interval between readiness polls
    pub ready_poll_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::Pinecone,
            name: "the-library".to_string(),
            dimension: 1024,
            metric: Metric::Cosine,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            api_key: None,
            control_url: "https://api.pinecone.io".to_string(),
            upsert_batch_size: 100,
            ready_timeout_secs: 120,
            ready_poll_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks fed to the model per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> RagConfig {
        let mut config = RagConfig::default();
        config.index.backend = IndexBackendKind::Memory;
        config
    }

    #[test]
    fn test_defaults_are_valid_for_memory_backend() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = memory_config();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 100;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_pinecone_requires_api_key() {
        let mut config = RagConfig::default();
        config.index.api_key = None;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.index.api_key = Some("pc-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut config = memory_config();
        config.embeddings.dimensions = 768;
        assert!(matches!(
            config.validate(),
            Err(Error::DimensionMismatch { expected: 1024, actual: 768 })
        ));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml(
            r#"
            [chunking]
            chunk_size = 20
            chunk_overlap = 5

            [index]
            backend = "memory"
            name = "notes"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 20);
        assert_eq!(config.chunking.chunk_overlap, 5);
        assert_eq!(config.chunking.separators, default_separators());
        assert_eq!(config.index.backend, IndexBackendKind::Memory);
        assert_eq!(config.index.name, "notes");
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embeddings.model, "mxbai-embed-large");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            RagConfig::from_toml("[chunking\nchunk_size = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Memory".parse::<IndexBackendKind>().unwrap(), IndexBackendKind::Memory);
        assert!("faiss".parse::<IndexBackendKind>().is_err());
    }

    #[test]
    fn test_normalize_ollama_host() {
        assert_eq!(normalize_ollama_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_ollama_host("https://ollama.local/"), "https://ollama.local");
    }
}
