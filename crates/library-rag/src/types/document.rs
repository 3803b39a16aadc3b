//! Document and chunk types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata key holding the chunk text inside an index entry
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the source file path
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the parent document id
pub const DOCUMENT_ID_KEY: &str = "document_id";
/// Metadata key holding the chunk position within its document
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A loaded source document; immutable once created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Stable document ID derived from the source path
    pub id: Uuid,
    /// Path the document was read from
    pub source_path: String,
    /// Full text content
    pub raw_text: String,
    /// SHA-256 of the content
    pub content_hash: String,
}

impl Document {
    /// Create a document; the id is stable for a given source path
    pub fn new(source_path: impl Into<String>, raw_text: impl Into<String>) -> Self {
        use sha2::{Digest, Sha256};

        let source_path = source_path.into();
        let raw_text = raw_text.into();
        let content_hash = hex::encode(Sha256::digest(raw_text.as_bytes()));

        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, source_path.as_bytes()),
            source_path,
            raw_text,
            content_hash,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// A bounded, contiguous slice of a document's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Chunk ID, stable for (document, position)
    pub id: Uuid,
    /// Parent document ID
    pub parent_document_id: Uuid,
    /// Chunk text
    pub text: String,
    /// Source path, position and character offsets
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create the `index`-th chunk of `doc`, spanning characters `[char_start, char_end)`
    pub fn new(doc: &Document, text: String, index: usize, char_start: usize, char_end: usize) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), serde_json::json!(doc.source_path));
        metadata.insert(DOCUMENT_ID_KEY.to_string(), serde_json::json!(doc.id.to_string()));
        metadata.insert(CHUNK_INDEX_KEY.to_string(), serde_json::json!(index));
        metadata.insert("char_start".to_string(), serde_json::json!(char_start));
        metadata.insert("char_end".to_string(), serde_json::json!(char_end));

        Self {
            id: Uuid::new_v5(&doc.id, index.to_string().as_bytes()),
            parent_document_id: doc.id,
            text,
            metadata,
        }
    }

    /// Position of this chunk within its document
    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata
            .get(CHUNK_INDEX_KEY)
            // index services may hand integers back as floats
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
            .map(|v| v as usize)
    }

    /// Source path of the parent document
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(|v| v.as_str())
    }

    /// Metadata as stored in the index: the chunk's own metadata plus its text
    pub fn to_index_metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        map.insert(TEXT_KEY.to_string(), serde_json::json!(self.text));
        map
    }

    /// Rebuild a chunk from an index entry's id and metadata
    pub fn from_index_metadata(
        id: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<Self> {
        let id = Uuid::parse_str(id).ok()?;
        let text = metadata.get(TEXT_KEY)?.as_str()?.to_string();
        let parent_document_id = metadata
            .get(DOCUMENT_ID_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_default();
        let metadata = metadata
            .iter()
            .filter(|(k, _)| k.as_str() != TEXT_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            id,
            parent_document_id,
            text,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_stable_per_path() {
        let a = Document::new("contexts/sky.txt", "The sky is blue.");
        let b = Document::new("contexts/sky.txt", "Edited content.");
        let c = Document::new("contexts/grass.txt", "The sky is blue.");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.content_hash, c.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_chunk_metadata_survives_index_roundtrip() {
        let doc = Document::new("contexts/sky.txt", "The sky is blue.");
        let chunk = Chunk::new(&doc, "The sky".to_string(), 3, 0, 7);

        let stored = chunk.to_index_metadata();
        assert_eq!(stored.get(TEXT_KEY).and_then(|v| v.as_str()), Some("The sky"));

        let restored = Chunk::from_index_metadata(&chunk.id.to_string(), &stored).unwrap();
        assert_eq!(restored, chunk);
        assert_eq!(restored.chunk_index(), Some(3));
        assert_eq!(restored.source(), Some("contexts/sky.txt"));
    }

    #[test]
    fn test_entry_without_text_is_rejected() {
        let metadata = serde_json::Map::new();
        assert!(Chunk::from_index_metadata(&Uuid::new_v4().to_string(), &metadata).is_none());
    }
}
