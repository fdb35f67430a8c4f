pub mod chunker;
pub mod loader;

use std::path::Path;
use std::sync::Arc;

use crate::config::IngestionConfig;
use crate::error::{AppError, Result};
use crate::index::{DocumentChunk, VectorIndex};
use crate::llm::{Embedder, EmbeddingTask};

pub use chunker::TextSplitter;
pub use loader::DocumentFormat;

/// Builds the vector index from a directory of source documents.
///
/// Runs once per process; rebuilding means calling `build` again and
/// replacing the whole index. Concurrent builds are not supported.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    formats: Vec<DocumentFormat>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, config: &IngestionConfig) -> Result<Self> {
        let formats = config
            .extensions
            .iter()
            .map(|ext| {
                DocumentFormat::from_extension(ext.trim_start_matches('.')).ok_or_else(|| {
                    AppError::Config(format!("Unsupported document extension: {ext}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embedder,
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap),
            formats,
        })
    }

    pub async fn build(&self, directory: &Path) -> Result<VectorIndex> {
        let files = loader::discover(directory, &self.formats).await?;

        tracing::info!(
            directory = %directory.display(),
            files = files.len(),
            "Loading documents"
        );

        let mut chunks = Vec::new();
        let mut documents = 0usize;

        for file in &files {
            match loader::load_text(file).await {
                Ok(text) => {
                    documents += 1;
                    let pieces = self.splitter.split(&text);
                    tracing::debug!(file = %file.name, chunks = pieces.len(), "Document split");
                    chunks.extend(pieces.into_iter().enumerate().map(|(position, content)| {
                        DocumentChunk {
                            content,
                            source: file.name.clone(),
                            position,
                        }
                    }));
                }
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Skipping document that failed to load");
                }
            }
        }

        let mut index = VectorIndex::new();

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts, EmbeddingTask::Document)
                .await
                .map_err(|e| AppError::Ingestion(format!("Embedding chunks failed: {e}")))?;

            if vectors.len() != chunks.len() {
                return Err(AppError::Ingestion(format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                )));
            }

            for (chunk, vector) in chunks.into_iter().zip(vectors) {
                index.insert(chunk, vector)?;
            }
        }

        index.set_document_count(documents);

        if documents == 0 {
            tracing::warn!(directory = %directory.display(), "No documents loaded; index is empty");
        }

        tracing::info!(
            documents,
            chunks = index.len(),
            embedder = self.embedder.model_name(),
            "Vector index built"
        );

        Ok(index)
    }
}
