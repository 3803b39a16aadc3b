//! Document loading and chunking

mod chunker;
mod loader;

pub use chunker::{Span, TextChunker};
pub use loader::DocumentLoader;
