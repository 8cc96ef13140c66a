use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::QuizError;
use crate::models::message::{AnswerSubmittedPayload, QuestionView};
use crate::models::requests::{JoinSessionRequest, SubmitAnswerRequest};
use crate::models::{Principal, Session};
use crate::services::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(flatten)]
    pub session: Session,
    pub participant_count: usize,
    pub connected_count: usize,
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let session = state.sessions.get_session(&session_id).await?;
    let participant_count = state
        .repos
        .participants
        .count_by_session(&session_id)
        .await?;
    let connected_count = state.hub.session_client_count(&session_id).await;

    Ok(Json(SessionInfo {
        session,
        participant_count,
        connected_count,
    }))
}

/// POST /api/v1/sessions/{id}/join
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<String>,
    Json(req): Json<JoinSessionRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate()
        .map_err(|e| QuizError::invalid_input(format!("Validation error: {}", e)))?;

    let display_name = req
        .display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| principal.display_name.clone());

    let participant = state
        .sessions
        .join_session(&session_id, &principal.user_id, &display_name)
        .await?;
    Ok((StatusCode::OK, Json(participant)))
}

/// GET /api/v1/sessions/{id}/participants
pub async fn get_participants(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let participants = state.sessions.get_participants(&session_id).await?;
    Ok(Json(participants))
}

/// GET /api/v1/sessions/{id}/current-question
///
/// Players get the question without its correct option.
pub async fn get_current_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let question = state.quiz.current_question(&session_id).await?;
    Ok(Json(QuestionView::from(&question)))
}

/// POST /api/v1/sessions/{id}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate()
        .map_err(|e| QuizError::invalid_input(format!("Validation error: {}", e)))?;

    let answer = state
        .quiz
        .submit_answer(
            &session_id,
            &principal.user_id,
            &req.question_id,
            req.selected_option,
            req.response_time,
        )
        .await?;

    Ok(Json(AnswerSubmittedPayload {
        question_id: answer.question_id,
        selected_option: answer.selected_option,
        is_correct: answer.is_correct,
    }))
}
