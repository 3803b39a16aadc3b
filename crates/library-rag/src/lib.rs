//! library-rag: Question answering over a folder of text documents
//!
//! Documents are chunked, embedded with a local Ollama model and written into a
//! vector index that is rebuilt from scratch on every start. Questions then run
//! through a two-stage pipeline: retrieve the nearest chunks, then stream an
//! answer from the chat model grounded on them.

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use index::VectorIndexClient;
pub use pipeline::{IndexReport, Indexer, Pipeline, Stage};
pub use types::{Chunk, Document, PipelineState, StateUpdate};
