//! Recursive separator-based text chunking with exact overlap

use crate::config::{default_separators, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Character span `[start, end)` of a chunk within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Text chunker with configurable size, overlap and separator priority
///
/// Sizes are counted in characters. Each chunk ends just after the coarsest
/// separator that fits inside the size window; the next chunk starts exactly
/// `overlap` characters before that end.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Characters shared by consecutive chunks
    overlap: usize,
    /// Separators, coarsest first
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a chunker with the default separators
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, overlap, default_separators())
    }

    /// Create a chunker with an explicit separator priority list
    pub fn with_separators(chunk_size: usize, overlap: usize, separators: Vec<String>) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
            separators: separators.clone(),
        }
        .validate()?;

        Ok(Self {
            chunk_size,
            overlap,
            separators,
        })
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::with_separators(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split documents into chunks, preserving document order and chunk order
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }

    /// Chunk a single document
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let offsets = char_offsets(&doc.raw_text);

        self.split_spans(&doc.raw_text)
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let text = doc.raw_text[offsets[span.start]..offsets[span.end]].to_string();
                Chunk::new(doc, text, index, span.start, span.end)
            })
            .collect()
    }

    /// Compute chunk spans (in characters) for a text
    pub fn split_spans(&self, text: &str) -> Vec<Span> {
        let offsets = char_offsets(text);
        let total = offsets.len() - 1;

        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![Span { start: 0, end: total }];
        }

        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            if total - start <= self.chunk_size {
                spans.push(Span { start, end: total });
                break;
            }

            let limit = start + self.chunk_size;
            let end = self
                .find_boundary(text, &offsets, start, limit)
                .unwrap_or(limit);

            spans.push(Span { start, end });
            // end > start + overlap, so this always advances
            start = end - self.overlap;
        }

        spans
    }

    /// Latest boundary of the coarsest separator inside `(start + overlap, limit]`
    fn find_boundary(&self, text: &str, offsets: &[usize], start: usize, limit: usize) -> Option<usize> {
        let window = &text[offsets[start]..offsets[limit]];

        for separator in &self.separators {
            if let Some(idx) = window.rfind(separator.as_str()) {
                let end = start + window[..idx + separator.len()].chars().count();
                if end > start + self.overlap {
                    return Some(end);
                }
            }
        }

        None
    }
}

/// Byte offset of every character, plus the text length
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKY: &str = "The sky is blue. The grass is green.";

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Reassemble a document by dropping each follow-up chunk's leading overlap
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(matches!(TextChunker::new(20, 20), Err(Error::Config(_))));
        assert!(matches!(TextChunker::new(20, 25), Err(Error::Config(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(Error::Config(_))));
        assert!(TextChunker::new(20, 19).is_ok());
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let doc = Document::new("sky.txt", SKY);
        let chunks = chunker.chunk_document(&doc);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, SKY);
        assert_eq!(chunks[0].chunk_index(), Some(0));
    }

    #[test]
    fn test_exact_size_document_is_single_chunk() {
        let chunker = TextChunker::new(SKY.chars().count(), 5).unwrap();
        let chunks = chunker.chunk_document(&Document::new("sky.txt", SKY));
        assert_eq!(texts(&chunks), vec![SKY]);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let chunker = TextChunker::new(20, 5).unwrap();
        assert!(chunker.chunk_document(&Document::new("empty.txt", "")).is_empty());
    }

    #[test]
    fn test_sky_document_splits_on_sentence_then_word() {
        let chunker = TextChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk_document(&Document::new("sky.txt", SKY));

        assert_eq!(
            texts(&chunks),
            vec!["The sky is blue. ", "lue. The grass is ", "s is green."]
        );
        assert_eq!(reconstruct(&chunks, 5), SKY);
    }

    #[test]
    fn test_consecutive_chunks_share_exact_overlap() {
        let text = "Rust is a systems language.\n\nIt has ownership. Borrowing is checked at compile time.\n\
                    Lifetimes describe how long references live. Traits describe shared behaviour.\n\n\
                    Cargo builds and tests crates. Crates are published to crates.io for everyone.";
        let chunker = TextChunker::new(48, 12).unwrap();
        let chunks = chunker.chunk_document(&Document::new("rust.txt", text));

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(prev[prev.len() - 12..], next[..12]);
        }
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 48);
        }
        assert_eq!(reconstruct(&chunks, 12), text);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = "First paragraph here.\n\nSecond one. It keeps going for a while longer.";
        let chunker = TextChunker::new(40, 4).unwrap();
        let chunks = chunker.chunk_document(&Document::new("p.txt", text));

        assert_eq!(chunks[0].text, "First paragraph here.\n\n");
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunker = TextChunker::new(10, 3).unwrap();
        let chunks = chunker.chunk_document(&Document::new("alpha.txt", text));

        assert_eq!(
            texts(&chunks),
            vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
        );
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "ünïcödé wörds äré spläyéd öüt hérë";
        let chunker = TextChunker::new(12, 2).unwrap();
        let chunks = chunker.chunk_document(&Document::new("u.txt", text));

        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 12);
        }
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let docs = vec![
            Document::new("a.txt", SKY),
            Document::new("b.txt", "One. Two. Three. Four. Five. Six. Seven. Eight."),
        ];
        let chunker = TextChunker::new(20, 5).unwrap();

        let first = chunker.split(&docs);
        let second = chunker.split(&docs);
        assert_eq!(first, second);
        assert_eq!(first[0].parent_document_id, docs[0].id);
        assert_eq!(first.last().unwrap().parent_document_id, docs[1].id);
    }

    #[test]
    fn test_chunk_offsets_recorded() {
        let chunker = TextChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk_document(&Document::new("sky.txt", SKY));

        assert_eq!(chunks[1].metadata["char_start"], serde_json::json!(12));
        assert_eq!(chunks[1].metadata["char_end"], serde_json::json!(30));
        assert_eq!(chunks[2].chunk_index(), Some(2));
    }
}
