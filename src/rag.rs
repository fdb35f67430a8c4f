use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::llm::{ChatModel, CompletionRequest};
use crate::retrieval::RetrievalResult;

/// Reply the model is instructed to give when the context is insufficient.
/// Also used as the answer whenever nothing grounded was found.
pub const NO_ANSWER_SENTINEL: &str = "I don't know.";

const RAG_SYSTEM_PROMPT: &str = "You are the internal HR/IT policy assistant for the company. \
Answer using only the provided context, in the same language as the question. \
Reply in plain prose, never as a JSON object. \
If the context is not sufficient to answer, reply with exactly: I don't know.";

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAnswer {
    pub answer: String,
    /// Verbatim chunk contents in retrieval order; empty unless `found`.
    pub citations: Vec<String>,
    pub found: bool,
}

impl SynthesizedAnswer {
    fn not_found() -> Self {
        Self {
            answer: NO_ANSWER_SENTINEL.to_string(),
            citations: Vec::new(),
            found: false,
        }
    }
}

/// Writes a grounded answer from retrieved chunks.
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn synthesize(&self, question: &str, chunks: &RetrievalResult) -> Result<SynthesizedAnswer> {
        // No grounding at all: never ask the model
        if chunks.is_empty() {
            tracing::info!("No context retrieved, skipping generation");
            return Ok(SynthesizedAnswer::not_found());
        }

        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest::text(RAG_SYSTEM_PROMPT, rag_prompt(question, &context));

        let reply = self
            .model
            .complete(&request)
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?;

        if reply.trim() == NO_ANSWER_SENTINEL {
            tracing::info!(chunks = chunks.len(), "Model could not ground an answer");
            return Ok(SynthesizedAnswer::not_found());
        }

        Ok(SynthesizedAnswer {
            answer: reply,
            citations: chunks.iter().map(|c| c.content.clone()).collect(),
            found: true,
        })
    }
}

fn rag_prompt(question: &str, context: &str) -> String {
    format!("Question: {question}\n\nContext:\n{context}")
}
