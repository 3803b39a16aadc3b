//! Error types for the RAG pipeline

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunk sizes, missing credentials, unreadable config
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding model unreachable or returned a malformed vector
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Chat model unreachable or the answer stream broke
    #[error("Completion service error: {0}")]
    CompletionService(String),

    /// Vector index backend unreachable, rejected a request, or never became ready
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Embedding dimension does not match the index dimension
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding service error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService(message.into())
    }

    /// Create a completion service error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionService(message.into())
    }

    /// Create an index unavailable error
    pub fn index(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors that must abort startup rather than fail a single query
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DimensionMismatch { .. })
    }
}
