//! In-process vector index backend
//!
//! Brute-force scan over every entry. Used for tests and for running the
//! pipeline without an external index service.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::Metric;
use crate::error::{Error, Result};

use super::vector_index::{IndexBackend, IndexHandle, IndexMatch, IndexRecord, IndexSpec, IndexStatus};

struct MemoryIndex {
    spec: IndexSpec,
    /// Entries in first-insertion order
    entries: Vec<IndexRecord>,
    /// Entry id -> position in `entries`
    positions: HashMap<String, usize>,
    /// Readiness polls answered so far
    polls: usize,
    /// Count requests answered so far
    count_polls: usize,
}

/// In-memory index service
pub struct MemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
    /// Polls before a new index reports ready; `None` never becomes ready
    ready_after_polls: Option<usize>,
    /// Count requests answered with 0 before entries become visible
    count_lag_polls: usize,
}

impl MemoryBackend {
    /// Indexes are ready as soon as they are created
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            ready_after_polls: Some(0),
            count_lag_polls: 0,
        }
    }

    /// Indexes report not-ready for the first `polls` readiness checks
    pub fn with_ready_after(polls: usize) -> Self {
        Self {
            ready_after_polls: Some(polls),
            ..Self::new()
        }
    }

    /// Indexes never report ready
    pub fn never_ready() -> Self {
        Self {
            ready_after_polls: None,
            ..Self::new()
        }
    }

    /// Written entries stay invisible to `count` for the first `polls` requests
    pub fn with_count_lag(polls: usize) -> Self {
        Self {
            count_lag_polls: polls,
            ..Self::new()
        }
    }

    fn missing(name: &str) -> Error {
        Error::index(format!("Index '{}' does not exist", name))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Score under a metric; `higher_is_nearer` tells how to rank it
fn score(metric: Metric, a: &[f32], b: &[f32]) -> (f32, bool) {
    match metric {
        Metric::Cosine => (cosine_similarity(a, b), true),
        Metric::Dotproduct => (dot_product(a, b), true),
        Metric::Euclidean => (squared_euclidean(a, b), false),
    }
}

#[async_trait]
impl IndexBackend for MemoryBackend {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.indexes
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::missing(name))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&spec.name) {
            return Err(Error::index(format!("Index '{}' already exists", spec.name)));
        }
        indexes.insert(
            spec.name.clone(),
            MemoryIndex {
                spec: spec.clone(),
                entries: Vec::new(),
                positions: HashMap::new(),
                polls: 0,
                count_polls: 0,
            },
        );
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexStatus> {
        let mut indexes = self.indexes.write();
        let index = indexes.get_mut(name).ok_or_else(|| Self::missing(name))?;

        let ready = match self.ready_after_polls {
            Some(after) => index.polls >= after,
            None => false,
        };
        index.polls += 1;

        Ok(IndexStatus {
            ready,
            host: None,
            dimension: index.spec.dimension,
        })
    }

    async fn upsert(&self, handle: &IndexHandle, records: &[IndexRecord]) -> Result<usize> {
        let mut indexes = self.indexes.write();
        let index = indexes
            .get_mut(&handle.name)
            .ok_or_else(|| Self::missing(&handle.name))?;

        for record in records {
            if record.values.len() != index.spec.dimension {
                return Err(Error::index(format!(
                    "Vector '{}' has dimension {}, index expects {}",
                    record.id,
                    record.values.len(),
                    index.spec.dimension
                )));
            }
            match index.positions.get(&record.id) {
                // overwrite in place, keeping the original insertion slot
                Some(&pos) => index.entries[pos] = record.clone(),
                None => {
                    index.positions.insert(record.id.clone(), index.entries.len());
                    index.entries.push(record.clone());
                }
            }
        }

        Ok(records.len())
    }

    async fn query(&self, handle: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let indexes = self.indexes.read();
        let index = indexes
            .get(&handle.name)
            .ok_or_else(|| Self::missing(&handle.name))?;

        if vector.len() != index.spec.dimension {
            return Err(Error::index(format!(
                "Query vector has dimension {}, index expects {}",
                vector.len(),
                index.spec.dimension
            )));
        }

        let mut scored: Vec<(f32, bool, &IndexRecord)> = index
            .entries
            .iter()
            .map(|entry| {
                let (s, higher_is_nearer) = score(index.spec.metric, vector, &entry.values);
                (s, higher_is_nearer, entry)
            })
            .collect();

        // stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| {
            let ord = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
            if a.1 {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, _, entry)| IndexMatch {
                id: entry.id.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self, handle: &IndexHandle) -> Result<usize> {
        let mut indexes = self.indexes.write();
        let index = indexes
            .get_mut(&handle.name)
            .ok_or_else(|| Self::missing(&handle.name))?;

        index.count_polls += 1;
        if index.count_polls <= self.count_lag_polls {
            return Ok(0);
        }
        Ok(index.entries.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
