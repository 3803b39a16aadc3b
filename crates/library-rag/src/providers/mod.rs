//! Provider abstractions for embeddings, chat completion and vector indexes
//!
//! The embedding model, the chat model and the index service are external;
//! these traits are the seams the pipeline talks through.

pub mod embedding;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod pinecone;
pub mod vector_index;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LlmProvider, Role, TextStream};
pub use memory::MemoryBackend;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use pinecone::PineconeBackend;
pub use vector_index::{IndexBackend, IndexHandle, IndexMatch, IndexRecord, IndexSpec, IndexStatus};
