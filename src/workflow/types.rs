use std::fmt;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::triage::Classification;

/// Processing stages of the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Triage,
    AutoResolve,
    RequestInfo,
    OpenTicket,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Triage => "TRIAGE",
            Stage::AutoResolve => "AUTO_RESOLVE",
            Stage::RequestInfo => "REQUEST_INFO",
            Stage::OpenTicket => "OPEN_TICKET",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which terminal stage produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalAction {
    AutoResolved,
    InfoRequested,
    TicketOpened,
}

impl FinalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalAction::AutoResolved => "AUTO_RESOLVED",
            FinalAction::InfoRequested => "INFO_REQUESTED",
            FinalAction::TicketOpened => "TICKET_OPENED",
        }
    }
}

impl fmt::Display for FinalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial result of one stage, merged into [`WorkflowState`].
/// `None` leaves the corresponding field untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StageUpdate {
    pub classification: Option<Classification>,
    pub answer: Option<String>,
    pub citations: Option<Vec<String>>,
    pub rag_succeeded: Option<bool>,
    pub final_action: Option<FinalAction>,
}

/// The record threaded through one workflow run.
///
/// Created with only the question, mutated exclusively through
/// [`WorkflowState::apply`], and dropped when the run returns.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    question: String,
    classification: Option<Classification>,
    answer: Option<String>,
    citations: Vec<String>,
    rag_succeeded: bool,
    final_action: Option<FinalAction>,
    trace: Vec<Stage>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            classification: None,
            answer: None,
            citations: Vec::new(),
            rag_succeeded: false,
            final_action: None,
            trace: Vec::new(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn rag_succeeded(&self) -> bool {
        self.rag_succeeded
    }

    pub fn final_action(&self) -> Option<FinalAction> {
        self.final_action
    }

    /// Stages executed so far, in order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    pub(crate) fn record_stage(&mut self, stage: Stage) -> Result<()> {
        if self.trace.contains(&stage) {
            return Err(AppError::Workflow(format!(
                "Stage {stage} already executed in this run (trace: {})",
                format_trace(&self.trace)
            )));
        }
        self.trace.push(stage);
        Ok(())
    }

    /// Merge a stage's partial result. Fields absent from the update keep
    /// their earlier values.
    pub fn apply(&mut self, update: StageUpdate) -> Result<()> {
        if update.classification.is_some() && self.classification.is_some() {
            return Err(AppError::Workflow("Classification is already set".to_string()));
        }
        if update.answer.is_some() && self.answer.is_some() {
            return Err(AppError::Workflow("Answer is already set".to_string()));
        }
        if update.final_action.is_some() && self.final_action.is_some() {
            return Err(AppError::Workflow(format!(
                "Final action is already {}",
                self.final_action.map(|a| a.as_str()).unwrap_or_default()
            )));
        }

        let rag_succeeded = update.rag_succeeded.unwrap_or(self.rag_succeeded);
        let citations_non_empty = match &update.citations {
            Some(c) => !c.is_empty(),
            None => !self.citations.is_empty(),
        };
        if citations_non_empty && !rag_succeeded {
            return Err(AppError::Workflow(
                "Citations present without a successful retrieval".to_string(),
            ));
        }

        if let Some(classification) = update.classification {
            self.classification = Some(classification);
        }
        if let Some(answer) = update.answer {
            self.answer = Some(answer);
        }
        if let Some(citations) = update.citations {
            self.citations = citations;
        }
        self.rag_succeeded = rag_succeeded;
        if let Some(action) = update.final_action {
            self.final_action = Some(action);
        }

        Ok(())
    }
}

pub(crate) fn format_trace(trace: &[Stage]) -> String {
    trace.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> ")
}

/// Caller-facing result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    pub answer: String,
    pub citations: Vec<String>,
    pub decision: String,
    pub urgency: String,
    pub final_action: String,
    pub trace: Vec<Stage>,
}

impl TryFrom<WorkflowState> for AgentReply {
    type Error = AppError;

    fn try_from(state: WorkflowState) -> Result<Self> {
        let classification = state
            .classification
            .ok_or_else(|| AppError::Workflow("Run finished without a classification".to_string()))?;
        let answer = state
            .answer
            .ok_or_else(|| AppError::Workflow("Run finished without an answer".to_string()))?;
        let final_action = state
            .final_action
            .ok_or_else(|| AppError::Workflow("Run finished without a final action".to_string()))?;

        Ok(Self {
            answer,
            citations: state.citations,
            decision: classification.decision.as_str().to_string(),
            urgency: classification.urgency.as_str().to_string(),
            final_action: final_action.as_str().to_string(),
            trace: state.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{Decision, Urgency};

    fn classification() -> Classification {
        Classification {
            decision: Decision::AutoResolve,
            urgency: Urgency::Low,
            missing_fields: Vec::new(),
        }
    }

    #[test]
    fn test_new_state_has_only_question() {
        let state = WorkflowState::new("Qual o processo de férias?");
        assert_eq!(state.question(), "Qual o processo de férias?");
        assert!(state.classification().is_none());
        assert!(state.answer().is_none());
        assert!(state.citations().is_empty());
        assert!(!state.rag_succeeded());
        assert!(state.final_action().is_none());
    }

    #[test]
    fn test_apply_keeps_untouched_fields() {
        let mut state = WorkflowState::new("q");
        state
            .apply(StageUpdate {
                classification: Some(classification()),
                ..Default::default()
            })
            .unwrap();
        state
            .apply(StageUpdate {
                answer: Some("resposta".into()),
                citations: Some(vec!["c1".into()]),
                rag_succeeded: Some(true),
                final_action: Some(FinalAction::AutoResolved),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(state.classification(), Some(&classification()));
        assert_eq!(state.citations().to_vec(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_classification_is_write_once() {
        let mut state = WorkflowState::new("q");
        let update = StageUpdate {
            classification: Some(classification()),
            ..Default::default()
        };
        state.apply(update.clone()).unwrap();
        assert!(matches!(state.apply(update), Err(AppError::Workflow(_))));
    }

    #[test]
    fn test_final_action_is_write_once() {
        let mut state = WorkflowState::new("q");
        state
            .apply(StageUpdate {
                answer: Some("a".into()),
                final_action: Some(FinalAction::InfoRequested),
                ..Default::default()
            })
            .unwrap();
        let second = StageUpdate {
            final_action: Some(FinalAction::TicketOpened),
            ..Default::default()
        };
        assert!(state.apply(second).is_err());
        assert_eq!(state.final_action(), Some(FinalAction::InfoRequested));
    }

    #[test]
    fn test_citations_require_rag_success() {
        let mut state = WorkflowState::new("q");
        let update = StageUpdate {
            citations: Some(vec!["c".into()]),
            rag_succeeded: Some(false),
            ..Default::default()
        };
        assert!(state.apply(update).is_err());
        assert!(state.citations().is_empty());
    }

    #[test]
    fn test_stage_cannot_be_recorded_twice() {
        let mut state = WorkflowState::new("q");
        state.record_stage(Stage::Triage).unwrap();
        state.record_stage(Stage::AutoResolve).unwrap();
        let err = state.record_stage(Stage::Triage).unwrap_err();
        assert!(err.to_string().contains("TRIAGE -> AUTO_RESOLVE"));
    }

    #[test]
    fn test_reply_requires_answer() {
        let mut state = WorkflowState::new("q");
        state
            .apply(StageUpdate {
                classification: Some(classification()),
                ..Default::default()
            })
            .unwrap();
        assert!(AgentReply::try_from(state).is_err());
    }

    #[test]
    fn test_reply_serializes_camel_case() {
        let mut state = WorkflowState::new("q");
        state.record_stage(Stage::Triage).unwrap();
        state
            .apply(StageUpdate {
                classification: Some(classification()),
                answer: Some("a".into()),
                final_action: Some(FinalAction::InfoRequested),
                ..Default::default()
            })
            .unwrap();

        let reply = AgentReply::try_from(state).unwrap();
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["finalAction"], "INFO_REQUESTED");
        assert_eq!(value["decision"], "AUTO_RESOLVE");
        assert_eq!(value["urgency"], "LOW");
        assert_eq!(value["trace"][0], "TRIAGE");
    }
}
