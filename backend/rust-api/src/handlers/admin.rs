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
use crate::models::message::{AdminControlData, ParticipantPresence};
use crate::models::requests::{
    ControlRequest, CreateSessionRequest, GenerateQuestionRequest, ProcessResultsRequest,
    RevivalRequest,
};
use crate::models::{Participant, Principal, Session};
use crate::services::AppState;

fn validation_error(e: validator::ValidationErrors) -> QuizError {
    QuizError::invalid_input(format!("Validation error: {}", e))
}

/// POST /api/v1/admin/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate().map_err(validation_error)?;

    let session = state.sessions.create_session(req).await?;
    tracing::info!(
        session_id = %session.id,
        admin_id = %principal.user_id,
        "Session created by admin"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/admin/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, QuizError> {
    Ok(Json(state.sessions.list_sessions().await?))
}

/// POST /api/v1/admin/sessions/{id}/control
///
/// Same actions as the websocket `admin_control` frame. Responds with the
/// session state after the action.
pub async fn control_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!(
        session_id = %session_id,
        admin_id = %principal.user_id,
        action = ?req.action,
        "Admin control"
    );

    state
        .dispatcher
        .run_admin_action(
            &session_id,
            AdminControlData {
                action: req.action,
                question_id: None,
                count: None,
            },
        )
        .await?;

    Ok(Json(state.sessions.get_session(&session_id).await?))
}

/// GET /api/v1/admin/sessions/{id}/stats
pub async fn session_stats(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    Ok(Json(state.admin.session_stats(&session_id).await?))
}

#[derive(Debug, Serialize)]
pub struct SessionResults {
    pub session: Session,
    pub participants: Vec<Participant>,
}

/// GET /api/v1/admin/sessions/{id}/results
///
/// Final standings: every participant with status, score and transition times.
pub async fn session_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let session = state.sessions.get_session(&session_id).await?;
    let participants = state.sessions.get_participants(&session_id).await?;
    Ok(Json(SessionResults {
        session,
        participants,
    }))
}

/// POST /api/v1/admin/sessions/{id}/generate-question
pub async fn generate_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<GenerateQuestionRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let question = state
        .quiz
        .generate_question(&session_id, req.round, req.difficulty, req.category)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/v1/admin/sessions/{id}/questions
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    Ok(Json(state.quiz.list_questions(&session_id).await?))
}

/// POST /api/v1/admin/sessions/{id}/process-results
pub async fn process_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ProcessResultsRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let question_id = match req.question_id {
        Some(id) => id,
        None => state.quiz.current_question(&session_id).await?.id,
    };
    let outcome = state
        .rounds
        .process_round_results(&session_id, &question_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/admin/sessions/{id}/next-round
pub async fn next_round(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    Ok(Json(state.rounds.next_round(&session_id).await?))
}

/// POST /api/v1/admin/sessions/{id}/skip-question
pub async fn skip_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    Ok(Json(state.rounds.skip_question(&session_id).await?))
}

#[derive(Debug, Serialize)]
pub struct RevivalResponse {
    pub revived: Vec<ParticipantPresence>,
}

/// POST /api/v1/admin/sessions/{id}/revival
pub async fn start_revival(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<RevivalRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate().map_err(validation_error)?;

    let revived = state.revival.start_revival(&session_id, req.count).await?;
    Ok(Json(RevivalResponse {
        revived: revived.iter().map(ParticipantPresence::from).collect(),
    }))
}
