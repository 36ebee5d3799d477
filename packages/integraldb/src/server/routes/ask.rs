use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::common::PipelineError;
use crate::domains::query::{QueryOutcome, Route, Source};
use crate::server::app::AppState;

/// Longest question accepted, in characters.
const MAX_QUESTION_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// `answered` or `insufficient_information`
    pub status: &'static str,
    pub answer: String,
    pub route: Route,
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize)]
pub struct AskError {
    pub error: String,
}

impl From<QueryOutcome> for AskResponse {
    fn from(outcome: QueryOutcome) -> Self {
        let answer = outcome.answer_text().to_string();
        match outcome {
            QueryOutcome::Answered { sources, route, .. } => AskResponse {
                status: "answered",
                answer,
                route,
                sources,
            },
            QueryOutcome::InsufficientInformation { route } => AskResponse {
                status: "insufficient_information",
                answer,
                route,
                sources: Vec::new(),
            },
        }
    }
}

/// Answer one question from the catalog and documents.
pub async fn ask_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<AskError>)> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "question must not be empty"));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(reject(StatusCode::PAYLOAD_TOO_LARGE, "question is too long"));
    }

    match state.engine.ask(question).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Question failed");
            let status = match e {
                PipelineError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::Remote(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(reject(status, "the question could not be answered right now"))
        }
    }
}

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<AskError>) {
    (
        status,
        Json(AskError {
            error: message.to_string(),
        }),
    )
}
