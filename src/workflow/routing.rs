use crate::triage::{Classification, Decision};
use crate::workflow::graph::Node;
use crate::workflow::types::{Stage, WorkflowState};

/// Phrases that force a ticket when automatic resolution fails.
/// Matched as substrings of the lower-cased question.
pub const ESCALATION_KEYWORDS: &[&str] = &[
    "aprovação",
    "exceção",
    "liberação",
    "abrir ticket",
    "abrir chamado",
    "acesso especial",
    "approval",
    "exception",
    "release",
    "unlock",
    "open ticket",
    "open chamado",
    "special access",
];

/// Route after triage.
///
/// The classifier only ever yields the three known decisions; a decision
/// that does not name another stage falls back to `AutoResolve`.
pub fn route_after_triage(classification: &Classification) -> Stage {
    let next = match classification.decision {
        Decision::OpenTicket => Stage::OpenTicket,
        Decision::RequestInfo => Stage::RequestInfo,
        Decision::AutoResolve => Stage::AutoResolve,
    };
    tracing::info!(decision = %classification.decision, next = %next, "Routing after triage");
    next
}

/// Route after the automatic-resolution attempt.
pub fn route_after_auto_resolve(state: &WorkflowState) -> Node {
    if state.rag_succeeded() {
        tracing::info!("Retrieval answered the question, finishing");
        return Node::End;
    }

    if let Some(keyword) = escalation_keyword(state.question()) {
        tracing::info!(keyword, "No grounded answer; escalation keyword found, opening ticket");
        return Node::Stage(Stage::OpenTicket);
    }

    tracing::info!("No grounded answer and no escalation keyword, requesting more info");
    Node::Stage(Stage::RequestInfo)
}

/// First escalation keyword contained in `question`, if any.
pub fn escalation_keyword(question: &str) -> Option<&'static str> {
    let lowered = question.to_lowercase();
    ESCALATION_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lowered.contains(keyword))
}
