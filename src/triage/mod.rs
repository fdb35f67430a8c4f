mod prompt;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::llm::{ChatModel, CompletionRequest};

/// What the triage step recommends doing with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    #[serde(alias = "AUTO_RESOLVER")]
    AutoResolve,
    #[serde(alias = "PEDIR_INFO")]
    RequestInfo,
    #[serde(alias = "ABRIR_CHAMADO")]
    OpenTicket,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::AutoResolve => "AUTO_RESOLVE",
            Decision::RequestInfo => "REQUEST_INFO",
            Decision::OpenTicket => "OPEN_TICKET",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    #[serde(alias = "BAIXA")]
    Low,
    #[serde(alias = "MEDIA")]
    Medium,
    #[serde(alias = "ALTA")]
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "LOW",
            Urgency::Medium => "MEDIUM",
            Urgency::High => "HIGH",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema-validated triage result. Immutable once attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Classification {
    #[serde(alias = "decisao")]
    pub decision: Decision,
    #[serde(alias = "urgencia")]
    pub urgency: Urgency,
    #[serde(alias = "camposFaltantes")]
    pub missing_fields: Vec<String>,
}

impl Classification {
    /// Strictly parse raw model output. The reply must be exactly one JSON
    /// object of the expected shape (surrounding whitespace aside); prose,
    /// code fences, unknown fields and unknown tags are all rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return Err(AppError::Classification(format!(
                "Expected a bare JSON object, got: {}",
                preview(trimmed)
            )));
        }

        let mut classification: Classification = serde_json::from_str(trimmed)
            .map_err(|e| AppError::Classification(format!("Invalid triage output: {e}")))?;

        classification.normalize_missing_fields();
        Ok(classification)
    }

    /// Trim entries, drop blanks and collapse duplicates, keeping first order.
    fn normalize_missing_fields(&mut self) {
        let mut seen = Vec::with_capacity(self.missing_fields.len());
        for field in self.missing_fields.drain(..) {
            let field = field.trim().to_string();
            if !field.is_empty() && !seen.contains(&field) {
                seen.push(field);
            }
        }
        self.missing_fields = seen;
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Triage stage: asks the model to categorize a question.
pub struct Classifier {
    model: Arc<dyn ChatModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify a question. Any model failure or schema violation is a
    /// `Classification` error; there is no retry or default here.
    pub async fn classify(&self, question: &str) -> Result<Classification> {
        let request = CompletionRequest::json(prompt::TRIAGE_SYSTEM_PROMPT, prompt::triage_message(question));

        let raw = self.model.complete(&request).await.map_err(|e| match e {
            AppError::Classification(_) => e,
            other => AppError::Classification(format!("Model call failed: {other}")),
        })?;

        let classification = Classification::parse(&raw).inspect_err(|e| {
            tracing::warn!(error = %e, "Triage output rejected");
        })?;

        tracing::info!(
            decision = %classification.decision,
            urgency = %classification.urgency,
            missing_fields = classification.missing_fields.len(),
            "Question classified"
        );

        Ok(classification)
    }
}
