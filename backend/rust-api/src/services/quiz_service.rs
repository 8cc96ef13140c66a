use std::sync::Arc;

use crate::error::{QuizError, RepositoryError};
use crate::metrics::record_answer;
use crate::models::question::category_for_round;
use crate::models::{Answer, Difficulty, Question};
use crate::repositories::Repositories;
use crate::services::ai::AiService;
use crate::services::locks::SessionLocks;
use crate::services::notifier::Notifier;

/// Question generation and answer intake.
pub struct QuizService {
    repos: Repositories,
    locks: Arc<SessionLocks>,
    notifier: Notifier,
    ai: Arc<AiService>,
}

impl QuizService {
    pub fn new(
        repos: Repositories,
        locks: Arc<SessionLocks>,
        notifier: Notifier,
        ai: Arc<AiService>,
    ) -> Self {
        Self {
            repos,
            locks,
            notifier,
            ai,
        }
    }

    /// Generates, stores and announces a question for `round` (defaults to the
    /// current round). Difficulty and category follow the round unless given.
    pub async fn generate_question(
        &self,
        session_id: &str,
        round: Option<u32>,
        difficulty: Option<Difficulty>,
        category: Option<String>,
    ) -> Result<Question, QuizError> {
        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;
        if session.is_finished() {
            return Err(QuizError::SessionNotActive);
        }

        let round = round.unwrap_or(session.current_round).max(1);
        let difficulty = difficulty.unwrap_or_else(|| Difficulty::for_round(round));
        let category = category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| category_for_round(round).to_string());

        let (generated, provider) = self.ai.generate(difficulty, &category).await?;
        let question = Question::new(
            session_id,
            round,
            generated,
            difficulty,
            category,
            Some(provider.to_string()),
        );
        self.repos.questions.create(&question).await?;

        tracing::info!(
            session_id = %session_id,
            question_id = %question.id,
            round,
            provider,
            "Question generated"
        );
        self.notifier.question_start(&session, &question).await;
        Ok(question)
    }

    /// The earliest question at or after the current round.
    pub async fn current_question(&self, session_id: &str) -> Result<Question, QuizError> {
        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;

        self.repos
            .questions
            .get_by_session(session_id)
            .await?
            .into_iter()
            .find(|q| q.round >= session.current_round)
            .ok_or(QuizError::QuestionNotFound)
    }

    pub async fn list_questions(&self, session_id: &str) -> Result<Vec<Question>, QuizError> {
        self.repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;
        Ok(self.repos.questions.get_by_session(session_id).await?)
    }

    /// Records the caller's answer. A second submission for the same question
    /// returns the stored answer untouched.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        user_id: &str,
        question_id: &str,
        selected_option: i32,
        response_time_ms: u32,
    ) -> Result<Answer, QuizError> {
        // shared: concurrent answers proceed together, round resolution waits for them
        let _guard = self.locks.shared(session_id).await;

        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;
        if !session.is_active() {
            return Err(QuizError::SessionNotActive);
        }

        let participant = self
            .repos
            .participants
            .get_by_user_and_session(user_id, session_id)
            .await?
            .ok_or(QuizError::ParticipantNotFound)?;
        if !participant.is_active() {
            return Err(QuizError::ParticipantEliminated);
        }

        let question = self
            .repos
            .questions
            .get_by_id(question_id)
            .await?
            .filter(|q| q.session_id == session_id)
            .ok_or(QuizError::QuestionNotFound)?;

        if let Some(existing) = self
            .repos
            .answers
            .get_by_user_and_question(user_id, question_id)
            .await?
        {
            tracing::debug!(user_id = %user_id, question_id = %question_id, "Duplicate answer");
            return Ok(existing);
        }

        if question.is_closed() {
            return Err(QuizError::QuestionClosed);
        }

        let answer = Answer::new(user_id, &question, selected_option, response_time_ms);
        match self.repos.answers.create(&answer).await {
            Ok(()) => {}
            // a concurrent submission won the unique key; theirs is canonical
            Err(RepositoryError::Duplicate) => {
                return self
                    .repos
                    .answers
                    .get_by_user_and_question(user_id, question_id)
                    .await?
                    .ok_or(QuizError::Storage(RepositoryError::Duplicate));
            }
            Err(e) => return Err(e.into()),
        }

        if answer.is_correct {
            self.repos
                .participants
                .add_correct_answer(&participant.id, question.points())
                .await?;
        }

        record_answer(answer.is_correct);
        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            question_id = %question_id,
            correct = answer.is_correct,
            "Answer submitted"
        );
        Ok(answer)
    }
}
