use crate::triage::Classification;
use crate::workflow::types::{FinalAction, StageUpdate};

const MISSING_FIELDS_PLACEHOLDER: &str = "Tema e contexto específico";
const TICKET_DESCRIPTION_CHARS: usize = 140;

/// Ask the user to restate the question with the details triage flagged.
pub fn request_info(classification: &Classification) -> StageUpdate {
    let details = if classification.missing_fields.is_empty() {
        MISSING_FIELDS_PLACEHOLDER.to_string()
    } else {
        classification.missing_fields.join(",")
    };

    StageUpdate {
        answer: Some(format!(
            "Para avançar preciso que detalhe: {details}. Para que eu possa responder melhor, por favor, refaça a pergunta"
        )),
        citations: Some(Vec::new()),
        final_action: Some(FinalAction::InfoRequested),
        ..Default::default()
    }
}

/// Confirm that a ticket is being opened with the classified urgency.
pub fn open_ticket(question: &str, classification: &Classification) -> StageUpdate {
    let description: String = question.chars().take(TICKET_DESCRIPTION_CHARS).collect();

    StageUpdate {
        answer: Some(format!(
            "Abrindo chamado com urgência {}, descrição: {description}",
            classification.urgency
        )),
        citations: Some(Vec::new()),
        final_action: Some(FinalAction::TicketOpened),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{Decision, Urgency};

    fn classification(urgency: Urgency, missing: &[&str]) -> Classification {
        Classification {
            decision: Decision::RequestInfo,
            urgency,
            missing_fields: missing.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_request_info_joins_fields() {
        let update = request_info(&classification(Urgency::Low, &["política", "período"]));
        assert_eq!(
            update.answer.as_deref(),
            Some("Para avançar preciso que detalhe: política,período. Para que eu possa responder melhor, por favor, refaça a pergunta")
        );
        assert_eq!(update.citations, Some(Vec::new()));
        assert_eq!(update.final_action, Some(FinalAction::InfoRequested));
        assert!(update.classification.is_none());
    }

    #[test]
    fn test_request_info_placeholder() {
        let update = request_info(&classification(Urgency::Low, &[]));
        let answer = update.answer.unwrap();
        assert!(answer.starts_with("Para avançar preciso que detalhe: Tema e contexto específico."));
    }

    #[test]
    fn test_open_ticket_short_question() {
        let update = open_ticket("Quero abrir chamado para o RH", &classification(Urgency::High, &[]));
        assert_eq!(
            update.answer.as_deref(),
            Some("Abrindo chamado com urgência HIGH, descrição: Quero abrir chamado para o RH")
        );
        assert_eq!(update.final_action, Some(FinalAction::TicketOpened));
        assert_eq!(update.citations, Some(Vec::new()));
    }

    #[test]
    fn test_open_ticket_truncates_by_chars() {
        let question = "ç".repeat(200);
        let update = open_ticket(&question, &classification(Urgency::Medium, &[]));
        let answer = update.answer.unwrap();
        let description = answer.split("descrição: ").nth(1).unwrap();
        assert_eq!(description.chars().count(), 140);
        assert!(answer.contains("MEDIUM"));
    }
}
