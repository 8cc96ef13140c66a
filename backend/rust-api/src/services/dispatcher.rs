use std::sync::Arc;

use async_trait::async_trait;

use crate::error::QuizError;
use crate::hub::{ConnectionId, FrameContext, FrameHandler, Hub};
use crate::models::message::{
    AdminAction, AdminControlData, AnswerSubmitData, AnswerSubmittedPayload, ErrorPayload,
    JoinSessionData, ParticipantPresence,
};
use crate::models::{MessageType, OutboundMessage};
use crate::services::quiz_service::QuizService;
use crate::services::revival_service::RevivalService;
use crate::services::round_service::RoundService;
use crate::services::session_service::SessionService;

/// Routes inbound websocket frames to the quiz services and replies to the
/// originating connection.
#[derive(Clone)]
pub struct FrameDispatcher {
    hub: Arc<Hub>,
    sessions: Arc<SessionService>,
    quiz: Arc<QuizService>,
    rounds: Arc<RoundService>,
    revival: Arc<RevivalService>,
}

impl FrameDispatcher {
    pub fn new(
        hub: Arc<Hub>,
        sessions: Arc<SessionService>,
        quiz: Arc<QuizService>,
        rounds: Arc<RoundService>,
        revival: Arc<RevivalService>,
    ) -> Self {
        Self {
            hub,
            sessions,
            quiz,
            rounds,
            revival,
        }
    }

    async fn reply_error(&self, connection_id: ConnectionId, session_id: &str, err: &QuizError) {
        let reply = OutboundMessage::new(
            MessageType::Error,
            Some(session_id),
            ErrorPayload {
                error: err.to_string(),
            },
        );
        self.hub.send_to_connection(connection_id, &reply).await;
    }

    /// Runs one moderator action. `process_results` without a question id
    /// resolves the current question; `revival` without a count revives one.
    pub async fn run_admin_action(
        &self,
        session_id: &str,
        data: AdminControlData,
    ) -> Result<(), QuizError> {
        match data.action {
            AdminAction::Start => {
                self.sessions.start_session(session_id).await?;
            }
            AdminAction::Finish => {
                self.sessions.finish_session(session_id).await?;
            }
            AdminAction::NextRound => {
                self.rounds.next_round(session_id).await?;
            }
            AdminAction::ProcessResults => {
                let question_id = match data.question_id {
                    Some(id) => id,
                    None => self.quiz.current_question(session_id).await?.id,
                };
                self.rounds
                    .process_round_results(session_id, &question_id)
                    .await?;
            }
            AdminAction::Revival => {
                self.revival
                    .start_revival(session_id, data.count.unwrap_or(1))
                    .await?;
            }
            AdminAction::SkipQuestion => {
                self.rounds.skip_question(session_id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FrameHandler for FrameDispatcher {
    async fn on_answer_submit(&self, ctx: &FrameContext, session_id: &str, data: AnswerSubmitData) {
        let result = self
            .quiz
            .submit_answer(
                session_id,
                &ctx.principal.user_id,
                &data.question_id,
                data.selected_option,
                data.response_time,
            )
            .await;

        match result {
            Ok(answer) => {
                let reply = OutboundMessage::new(
                    MessageType::AnswerSubmitted,
                    Some(session_id),
                    AnswerSubmittedPayload {
                        question_id: answer.question_id,
                        selected_option: answer.selected_option,
                        is_correct: answer.is_correct,
                    },
                );
                self.hub.send_to_connection(ctx.connection_id, &reply).await;
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %session_id,
                    user_id = %ctx.principal.user_id,
                    "Answer rejected: {}",
                    e
                );
                self.reply_error(ctx.connection_id, session_id, &e).await;
            }
        }
    }

    async fn on_admin_control(&self, ctx: &FrameContext, session_id: &str, data: AdminControlData) {
        tracing::info!(
            session_id = %session_id,
            user_id = %ctx.principal.user_id,
            action = ?data.action,
            "Admin control"
        );

        // actions may pause for pacing, the read loop keeps going meanwhile
        let dispatcher = self.clone();
        let connection_id = ctx.connection_id;
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let action = data.action;
            if let Err(e) = dispatcher.run_admin_action(&session_id, data).await {
                tracing::warn!(session_id = %session_id, action = ?action, "Admin action failed: {}", e);
                dispatcher.reply_error(connection_id, &session_id, &e).await;
            }
        });
    }

    async fn on_join_session(&self, ctx: &FrameContext, data: JoinSessionData) -> Option<String> {
        let session_id = data.session_id;
        let joined = self
            .sessions
            .join_session(
                &session_id,
                &ctx.principal.user_id,
                &ctx.principal.display_name,
            )
            .await;

        match joined {
            Ok(participant) => {
                self.hub.assign_session(ctx.connection_id, &session_id).await;
                let reply = OutboundMessage::new(
                    MessageType::JoinSuccess,
                    Some(&session_id),
                    ParticipantPresence::from(&participant),
                );
                self.hub.send_to_connection(ctx.connection_id, &reply).await;
                Some(session_id)
            }
            Err(e) => {
                self.reply_error(ctx.connection_id, &session_id, &e).await;
                None
            }
        }
    }
}
