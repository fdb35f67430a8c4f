use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::index::VectorIndex;
use crate::ingest::Ingestor;
use crate::llm::GeminiClient;
use crate::rag::AnswerSynthesizer;
use crate::retrieval::Retriever;
use crate::triage::Classifier;
use crate::workflow::{AgentReply, WorkflowEngine};

/// Process-wide state: built once at startup and shared by every run.
pub struct AppState {
    pub config: AppConfig,
    pub engine: WorkflowEngine,
    pub index: Arc<VectorIndex>,
}

impl AppState {
    /// Build the model client, ingest the document directory and assemble
    /// the workflow engine.
    pub async fn init(config: AppConfig) -> Result<Self> {
        let client = Arc::new(GeminiClient::new(&config.gemini)?);

        let ingestor = Ingestor::new(client.clone(), &config.ingestion)?;
        let index = Arc::new(ingestor.build(&config.ingestion.documents_dir).await?);

        let stats = index.stats();
        if stats.chunks == 0 {
            tracing::warn!(
                directory = %config.ingestion.documents_dir.display(),
                "No chunks indexed; every question will fall back to requesting info or a ticket"
            );
        }
        tracing::info!(documents = stats.documents, chunks = stats.chunks, "Index ready");

        let retriever = Retriever::new(client.clone(), Arc::clone(&index), &config.retrieval);
        let engine = WorkflowEngine::new(
            Classifier::new(client.clone()),
            retriever,
            AnswerSynthesizer::new(client),
        )?;

        Ok(Self::from_parts(config, engine, index))
    }

    pub fn from_parts(config: AppConfig, engine: WorkflowEngine, index: Arc<VectorIndex>) -> Self {
        Self { config, engine, index }
    }

    /// Readiness report served by `GET /health`.
    pub fn health(&self) -> serde_json::Value {
        json!({
            "status": "ok",
            "index": self.index.stats(),
            "retrieval": {
                "topK": self.config.retrieval.top_k,
                "minSimilarity": self.config.retrieval.min_similarity,
            },
            "models": {
                "chat": self.config.gemini.chat_model,
                "embedding": self.config.gemini.embedding_model,
            },
        })
    }

    pub fn shutdown(&self) {
        tracing::info!(chunks = self.index.len(), "Releasing workflow engine and index");
    }
}

/// Answer one question end to end.
pub async fn agent_run(state: &AppState, question: &str) -> Result<AgentReply> {
    if question.trim().is_empty() {
        return Err(AppError::Workflow("Question must not be empty".to_string()));
    }

    let final_state = state.engine.run(question).await?;
    AgentReply::try_from(final_state)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agent/chat", post(chat))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> std::result::Result<Json<AgentReply>, ApiError> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "message must not be empty".to_string(),
        });
    }

    let reply = agent_run(&state, &request.message).await?;
    Ok(Json(reply))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.health())
}

/// HTTP view of an [`AppError`]. The body carries only the message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::Classification(_)
            | AppError::Retrieval(_)
            | AppError::Generation(_)
            | AppError::ModelApi(_)
            | AppError::ModelRateLimited(_)
            | AppError::ModelTransient(_)
            | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "Request failed");
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Rejected chat request body");
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};

    async fn rejected(body: &'static str) -> ApiError {
        let request = Request::builder()
            .method("POST")
            .uri("/agent/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let rejection = Json::<ChatRequest>::from_request(request, &()).await.unwrap_err();
        ApiError::from(rejection)
    }

    async fn body_json(err: ApiError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_message_is_json_error() {
        let err = rejected(r#"{"question": "oi"}"#).await;
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(err).await;
        assert!(body["error"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let err = rejected("{not json").await;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(err).await["error"].is_string());
    }

    #[test]
    fn test_stage_failures_map_to_bad_gateway() {
        for err in [
            AppError::Classification("bad json".into()),
            AppError::Retrieval("embed".into()),
            AppError::Generation("503".into()),
            AppError::ModelRateLimited("429".into()),
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::BAD_GATEWAY);
        }
    }

    #[test]
    fn test_engine_failures_map_to_internal() {
        let err = ApiError::from(AppError::Workflow("revisit".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("revisit"));
    }
}
