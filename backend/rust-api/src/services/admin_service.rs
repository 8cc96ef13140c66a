use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::QuizError;
use crate::hub::Hub;
use crate::models::SessionStatus;
use crate::repositories::Repositories;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantCounts {
    pub total: usize,
    pub active: usize,
    pub eliminated: usize,
    pub connected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionCounts {
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCounts {
    pub total: usize,
    pub correct: usize,
    /// Percentage, 0 when nothing was answered yet.
    pub correct_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session: SessionSummary,
    pub participants: ParticipantCounts,
    pub questions: QuestionCounts,
    pub answers: AnswerCounts,
}

/// Read-only views for moderators.
pub struct AdminService {
    repos: Repositories,
    hub: Arc<Hub>,
}

impl AdminService {
    pub fn new(repos: Repositories, hub: Arc<Hub>) -> Self {
        Self { repos, hub }
    }

    pub async fn session_stats(&self, session_id: &str) -> Result<SessionStats, QuizError> {
        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;

        let participants = self.repos.participants.get_by_session(session_id).await?;
        let active = participants.iter().filter(|p| p.is_active()).count();
        let eliminated = participants.iter().filter(|p| p.is_eliminated()).count();
        let questions = self.repos.questions.get_by_session(session_id).await?;
        let answers = self.repos.answers.get_by_session(session_id).await?;
        let correct = answers.iter().filter(|a| a.is_correct).count();
        let correct_rate = if answers.is_empty() {
            0.0
        } else {
            correct as f64 / answers.len() as f64 * 100.0
        };

        Ok(SessionStats {
            session: SessionSummary {
                id: session.id,
                title: session.title,
                status: session.status,
                current_round: session.current_round,
                created_at: session.created_at,
            },
            participants: ParticipantCounts {
                total: participants.len(),
                active,
                eliminated,
                connected: self.hub.session_client_count(session_id).await,
            },
            questions: QuestionCounts {
                total: questions.len(),
            },
            answers: AnswerCounts {
                total: answers.len(),
                correct,
                correct_rate,
            },
        })
    }
}
