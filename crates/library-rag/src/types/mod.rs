//! Core types for the RAG pipeline

pub mod document;
pub mod state;

pub use document::{Chunk, Document};
pub use state::{PipelineState, StateUpdate};
