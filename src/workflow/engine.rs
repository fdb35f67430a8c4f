use crate::error::{AppError, Result};
use crate::rag::AnswerSynthesizer;
use crate::retrieval::Retriever;
use crate::triage::{Classification, Classifier};
use crate::workflow::graph::{Node, StageGraph};
use crate::workflow::routing::{route_after_auto_resolve, route_after_triage};
use crate::workflow::stages;
use crate::workflow::types::{format_trace, FinalAction, Stage, StageUpdate, WorkflowState};

/// Drives one question through triage, retrieval and the terminal stages.
///
/// The engine holds no per-run data; concurrent `run` calls are independent.
pub struct WorkflowEngine {
    classifier: Classifier,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    graph: StageGraph,
}

impl WorkflowEngine {
    pub fn new(classifier: Classifier, retriever: Retriever, synthesizer: AnswerSynthesizer) -> Result<Self> {
        Ok(Self {
            classifier,
            retriever,
            synthesizer,
            graph: StageGraph::standard()?,
        })
    }

    /// Run the full workflow for a single question.
    ///
    /// Fails fast: the first stage error aborts the run and no partial state
    /// is returned.
    pub async fn run(&self, question: &str) -> Result<WorkflowState> {
        let mut state = WorkflowState::new(question);
        let mut current = self.graph.entry()?;

        while let Node::Stage(stage) = current {
            state.record_stage(stage)?;
            tracing::info!(stage = %stage, "Entering stage");

            let update = self.execute(stage, &state).await.inspect_err(|e| {
                tracing::warn!(stage = %stage, error = %e, "Stage failed");
            })?;
            state.apply(update)?;

            let next = self.next_node(stage, &state)?;
            if !self.graph.allows(current, next) {
                return Err(AppError::Workflow(format!(
                    "Transition {current:?} -> {next:?} is not part of the stage graph (trace: {})",
                    format_trace(state.trace())
                )));
            }
            current = next;
        }

        tracing::info!(
            trace = %format_trace(state.trace()),
            final_action = %state.final_action().map(|a| a.as_str()).unwrap_or("NONE"),
            "Workflow finished"
        );

        Ok(state)
    }

    async fn execute(&self, stage: Stage, state: &WorkflowState) -> Result<StageUpdate> {
        match stage {
            Stage::Triage => {
                let classification = self.classifier.classify(state.question()).await?;
                Ok(StageUpdate {
                    classification: Some(classification),
                    ..Default::default()
                })
            }
            Stage::AutoResolve => self.auto_resolve(state.question()).await,
            Stage::RequestInfo => Ok(stages::request_info(classification(state)?)),
            Stage::OpenTicket => Ok(stages::open_ticket(state.question(), classification(state)?)),
        }
    }

    async fn auto_resolve(&self, question: &str) -> Result<StageUpdate> {
        let chunks = self.retriever.retrieve_default(question).await?;
        let synthesized = self.synthesizer.synthesize(question, &chunks).await?;

        tracing::info!(
            chunks = chunks.len(),
            found = synthesized.found,
            "Automatic resolution attempted"
        );

        // A failed attempt leaves the answer to the stage routed to next
        let (answer, final_action) = if synthesized.found {
            (Some(synthesized.answer), Some(FinalAction::AutoResolved))
        } else {
            (None, None)
        };

        Ok(StageUpdate {
            answer,
            citations: Some(synthesized.citations),
            rag_succeeded: Some(synthesized.found),
            final_action,
            ..Default::default()
        })
    }

    fn next_node(&self, stage: Stage, state: &WorkflowState) -> Result<Node> {
        Ok(match stage {
            Stage::Triage => Node::Stage(route_after_triage(classification(state)?)),
            Stage::AutoResolve => route_after_auto_resolve(state),
            Stage::RequestInfo | Stage::OpenTicket => Node::End,
        })
    }
}

fn classification(state: &WorkflowState) -> Result<&Classification> {
    state
        .classification()
        .ok_or_else(|| AppError::Workflow("Stage requires a classification but triage has not run".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::index::{DocumentChunk, VectorIndex};
    use crate::llm::{ChatModel, CompletionRequest, Embedder, EmbeddingTask};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Answers triage with a fixed JSON reply and generation with a fixed text.
    struct FixedModel {
        triage: String,
        answer: String,
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            if request.json_output {
                Ok(self.triage.clone())
            } else {
                Ok(self.answer.clone())
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn model_name(&self) -> &str {
            "unit"
        }
    }

    fn engine(triage: &str, answer: &str, chunks: &[&str]) -> WorkflowEngine {
        let model = Arc::new(FixedModel {
            triage: triage.to_string(),
            answer: answer.to_string(),
        });
        let mut index = VectorIndex::new();
        for (position, content) in chunks.iter().enumerate() {
            index
                .insert(
                    DocumentChunk {
                        content: content.to_string(),
                        source: "politicas.pdf".to_string(),
                        position,
                    },
                    vec![1.0, 0.0],
                )
                .unwrap();
        }
        let retriever = Retriever::new(Arc::new(UnitEmbedder), Arc::new(index), &RetrievalConfig::default());
        WorkflowEngine::new(
            Classifier::new(model.clone()),
            retriever,
            AnswerSynthesizer::new(model),
        )
        .unwrap()
    }

    const AUTO: &str = r#"{"decision":"AUTO_RESOLVE","urgency":"LOW","missingFields":[]}"#;

    #[tokio::test]
    async fn test_auto_resolved_trace() {
        let engine = engine(AUTO, "Sim, pode.", &["Reembolso de internet permitido."]);
        let state = engine.run("Posso reembolsar a internet?").await.unwrap();

        assert_eq!(state.trace(), &[Stage::Triage, Stage::AutoResolve]);
        assert_eq!(state.final_action(), Some(FinalAction::AutoResolved));
        assert_eq!(state.answer(), Some("Sim, pode."));
        assert_eq!(state.citations().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_resolution_falls_through_once() {
        let engine = engine(AUTO, "I don't know.", &["algo"]);
        let state = engine.run("Quem descobriu o Brasil?").await.unwrap();

        assert_eq!(state.trace(), &[Stage::Triage, Stage::AutoResolve, Stage::RequestInfo]);
        assert_eq!(state.final_action(), Some(FinalAction::InfoRequested));
        assert!(state.citations().is_empty());
        assert!(!state.rag_succeeded());
    }

    #[tokio::test]
    async fn test_open_ticket_skips_auto_resolve() {
        let triage = r#"{"decision":"OPEN_TICKET","urgency":"HIGH","missingFields":[]}"#;
        let engine = engine(triage, "unused", &["algo"]);
        let state = engine.run("Preciso de acesso especial").await.unwrap();

        assert_eq!(state.trace(), &[Stage::Triage, Stage::OpenTicket]);
        assert_eq!(state.final_action(), Some(FinalAction::TicketOpened));
    }

    #[tokio::test]
    async fn test_bad_triage_aborts_run() {
        let engine = engine("not json", "unused", &[]);
        let err = engine.run("pergunta").await.unwrap_err();
        assert!(matches!(err, AppError::Classification(_)));
    }
}
