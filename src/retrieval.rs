use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{AppError, Result};
use crate::index::{DocumentChunk, VectorIndex};
use crate::llm::{Embedder, EmbeddingTask};

/// Chunks most similar to a query, best first, at most `k` of them.
pub type RetrievalResult = Vec<DocumentChunk>;

/// Embeds a question and searches the shared index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    top_k: usize,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, config: &RetrievalConfig) -> Self {
        Self {
            embedder,
            index,
            top_k: config.top_k.max(1),
            min_similarity: config.min_similarity,
        }
    }

    /// Retrieve with the configured `k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve(query, self.top_k).await
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(AppError::Retrieval("k must be at least 1".to_string()));
        }

        // Nothing to match against; skip the embedding call
        if self.index.is_empty() {
            tracing::debug!("Index is empty, returning no chunks");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(query, EmbeddingTask::Query)
            .await
            .map_err(|e| AppError::Retrieval(format!("Query embedding failed: {e}")))?;

        let hits = self.index.search(&vector, k, self.min_similarity)?;

        tracing::info!(
            k,
            hits = hits.len(),
            best_score = hits.first().map(|h| h.score),
            "Retrieved chunks"
        );

        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AxisEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if text.contains("férias") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        async fn embed_batch(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text, task).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    fn chunk(content: &str, position: usize) -> DocumentChunk {
        DocumentChunk {
            content: content.to_string(),
            source: "rh.txt".to_string(),
            position,
        }
    }

    fn index() -> Arc<VectorIndex> {
        let mut index = VectorIndex::new();
        index.insert(chunk("férias: 30 dias", 0), vec![1.0, 0.0]).unwrap();
        index.insert(chunk("reembolso", 1), vec![0.0, 1.0]).unwrap();
        index.insert(chunk("férias coletivas", 2), vec![0.9, 0.1]).unwrap();
        Arc::new(index)
    }

    fn config(min_similarity: f32) -> RetrievalConfig {
        RetrievalConfig {
            top_k: 2,
            min_similarity,
        }
    }

    #[tokio::test]
    async fn test_returns_top_k_in_order() {
        let embedder = Arc::new(AxisEmbedder { calls: AtomicUsize::new(0) });
        let retriever = Retriever::new(embedder, index(), &config(0.0));

        let chunks = retriever.retrieve_default("como tirar férias?").await.unwrap();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["férias: 30 dias", "férias coletivas"]);
    }

    #[tokio::test]
    async fn test_threshold_can_empty_result() {
        let embedder = Arc::new(AxisEmbedder { calls: AtomicUsize::new(0) });
        let retriever = Retriever::new(embedder, index(), &config(0.999));

        let chunks = retriever.retrieve("reembolso?", 4).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "reembolso");
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let embedder = Arc::new(AxisEmbedder { calls: AtomicUsize::new(0) });
        let retriever = Retriever::new(embedder.clone(), Arc::new(VectorIndex::new()), &config(0.0));

        assert!(retriever.retrieve("qualquer", 4).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let embedder = Arc::new(AxisEmbedder { calls: AtomicUsize::new(0) });
        let retriever = Retriever::new(embedder, index(), &config(0.0));
        assert!(matches!(
            retriever.retrieve("x", 0).await,
            Err(AppError::Retrieval(_))
        ));
    }
}
