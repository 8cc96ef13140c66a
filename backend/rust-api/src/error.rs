use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// MongoDB server error code for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique key (participant per user+session, answer per user+question) already exists.
    #[error("duplicate key")]
    Duplicate,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<mongodb::error::Error> for RepositoryError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
            if write_error.code == DUPLICATE_KEY_CODE {
                return RepositoryError::Duplicate;
            }
        }
        RepositoryError::Backend(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for RepositoryError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        RepositoryError::Backend(err.to_string())
    }
}

/// Recoverable failures of quiz operations. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("invalid session status")]
    InvalidSessionStatus,
    #[error("session is full")]
    SessionFull,
    #[error("session is not active")]
    SessionNotActive,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("participant is eliminated")]
    ParticipantEliminated,
    #[error("question not found")]
    QuestionNotFound,
    #[error("question is closed")]
    QuestionClosed,
    /// Informational only: duplicate submissions resolve to the stored answer instead.
    #[error("answer already exists")]
    AnswerExists,
    #[error("revival is not enabled for this session")]
    RevivalDisabled,
    #[error("no eliminated participants available for revival")]
    NoRevivalCandidates,
    #[error("AI service is unavailable")]
    AiServiceUnavailable,
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl QuizError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        QuizError::InvalidInput(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            QuizError::SessionNotFound
            | QuizError::ParticipantNotFound
            | QuizError::QuestionNotFound => StatusCode::NOT_FOUND,
            QuizError::InvalidSessionStatus
            | QuizError::SessionFull
            | QuizError::SessionNotActive
            | QuizError::ParticipantEliminated
            | QuizError::QuestionClosed
            | QuizError::AnswerExists
            | QuizError::RevivalDisabled
            | QuizError::NoRevivalCandidates => StatusCode::CONFLICT,
            QuizError::AiServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            QuizError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(QuizError::SessionNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(QuizError::SessionFull.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            QuizError::invalid_input("title is required").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            QuizError::AiServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            QuizError::from(RepositoryError::Backend("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
