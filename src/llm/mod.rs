pub mod gemini;
pub mod retry;

use async_trait::async_trait;

use crate::error::Result;

pub use gemini::GeminiClient;
pub use retry::BackoffConfig;

/// A single-turn completion request: one system instruction plus one user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    /// Ask the model to emit a JSON document instead of free text.
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn text(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            json_output: false,
        }
    }

    pub fn json(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            json_output: true,
        }
    }
}

/// Text-completion model used for triage and answer synthesis.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the raw reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Whether an embedding represents a stored passage or a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

/// Embedding service used at index-build time and at query time.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;

    /// Embed several texts; the result is in input order.
    async fn embed_batch(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}
