use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};

/// A bounded slice of a source document; the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    /// File name of the document the chunk came from.
    pub source: String,
    /// Ordinal of the chunk within its document.
    pub position: usize,
}

/// A chunk together with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimensions: Option<usize>,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

/// In-memory similarity index over document chunks. Filled once during
/// ingestion, then shared read-only behind an `Arc` by every run.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<Entry>,
    dimensions: Option<usize>,
    documents: usize,
    built_at: DateTime<Utc>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            dimensions: None,
            documents: 0,
            built_at: Utc::now(),
        }
    }

    /// Add a chunk. All vectors in one index must share a dimension.
    pub fn insert(&mut self, chunk: DocumentChunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(AppError::Ingestion(format!(
                "Empty embedding for chunk {} of {}",
                chunk.position, chunk.source
            )));
        }

        match self.dimensions {
            Some(dims) if dims != vector.len() => {
                return Err(AppError::Ingestion(format!(
                    "Embedding dimension mismatch: index has {dims}, got {}",
                    vector.len()
                )));
            }
            Some(_) => {}
            None => self.dimensions = Some(vector.len()),
        }

        self.entries.push(Entry { chunk, vector });
        Ok(())
    }

    pub(crate) fn set_document_count(&mut self, documents: usize) {
        self.documents = documents;
        self.built_at = Utc::now();
    }

    /// Top `k` chunks by descending cosine similarity, dropping any that
    /// score below `min_similarity`. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(dims) = self.dimensions {
            if query.len() != dims {
                return Err(AppError::Retrieval(format!(
                    "Query dimension {} does not match index dimension {dims}",
                    query.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(query, &entry.vector)))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();

        // Stable sort, so ties stay in insertion order
        scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| ScoredChunk {
                chunk: self.entries[idx].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.documents,
            chunks: self.entries.len(),
            dimensions: self.dimensions,
            built_at: self.built_at,
        }
    }
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
