use std::sync::Arc;

use serde::Serialize;

use crate::hub::Hub;
use crate::models::message::{
    ParticipantPresence, ParticipantScore, QuestionEndPayload, QuestionStartPayload,
    QuestionView, RevivalResultPayload, RevivalStartPayload, RoundResultPayload,
    SessionUpdatePayload,
};
use crate::models::{MessageType, OutboundMessage, Participant, Question, Session};

/// Turns engine state transitions into session broadcasts.
#[derive(Clone)]
pub struct Notifier {
    hub: Arc<Hub>,
}

impl Notifier {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    async fn send<T: Serialize>(&self, kind: MessageType, session_id: &str, data: T) -> usize {
        let message = OutboundMessage::new(kind, Some(session_id), data);
        let delivered = self.hub.broadcast_to_session(session_id, &message).await;
        tracing::debug!(session_id = %session_id, kind = ?kind, delivered, "Broadcast");
        delivered
    }

    pub async fn question_start(&self, session: &Session, question: &Question) -> usize {
        self.send(
            MessageType::QuestionStart,
            &session.id,
            QuestionStartPayload {
                question: QuestionView::from(question),
                time_limit: session.settings.time_limit_seconds,
            },
        )
        .await
    }

    /// `correct_answer` is `None` for skipped questions.
    pub async fn question_end(
        &self,
        session_id: &str,
        question_id: &str,
        correct_answer: Option<i32>,
    ) -> usize {
        self.send(
            MessageType::QuestionEnd,
            session_id,
            QuestionEndPayload {
                question_id: question_id.to_string(),
                correct_answer: correct_answer.unwrap_or(-1),
            },
        )
        .await
    }

    pub async fn round_result(
        &self,
        session_id: &str,
        round: u32,
        survivors: &[Participant],
        eliminated: &[Participant],
    ) -> usize {
        self.send(
            MessageType::RoundResult,
            session_id,
            RoundResultPayload {
                round,
                survivors: survivors.iter().map(ParticipantScore::from).collect(),
                eliminated: eliminated.iter().map(ParticipantScore::from).collect(),
            },
        )
        .await
    }

    /// `participantCount` reports live connections in the session.
    pub async fn session_update(&self, session: &Session) -> usize {
        let participant_count = self.hub.session_client_count(&session.id).await;
        self.send(
            MessageType::SessionUpdate,
            &session.id,
            SessionUpdatePayload {
                status: session.status,
                current_round: session.current_round,
                participant_count,
            },
        )
        .await
    }

    pub async fn revival_start(&self, session_id: &str, candidates: &[Participant]) -> usize {
        self.send(
            MessageType::RevivalStart,
            session_id,
            RevivalStartPayload {
                candidates: candidates.iter().map(ParticipantPresence::from).collect(),
            },
        )
        .await
    }

    pub async fn revival_result(&self, session_id: &str, revived: &[Participant]) -> usize {
        self.send(
            MessageType::RevivalResult,
            session_id,
            RevivalResultPayload {
                revived: revived.iter().map(ParticipantPresence::from).collect(),
            },
        )
        .await
    }
}
