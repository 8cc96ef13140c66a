use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::QuizError;
use crate::metrics::{record_session_transition, PARTICIPANTS_ELIMINATED_TOTAL};
use crate::models::{Answer, Participant, Session};
use crate::repositories::Repositories;
use crate::services::locks::SessionLocks;
use crate::services::notifier::Notifier;
use crate::services::pacing::{PacingConfig, PacingPhase};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub round: u32,
    pub survivors: Vec<Participant>,
    pub eliminated: Vec<Participant>,
    pub session: Session,
}

impl RoundOutcome {
    pub fn finished_session(&self) -> bool {
        self.session.is_finished()
    }
}

/// Round resolution and advancement.
pub struct RoundService {
    repos: Repositories,
    locks: Arc<SessionLocks>,
    notifier: Notifier,
    pacing: PacingConfig,
}

impl RoundService {
    pub fn new(
        repos: Repositories,
        locks: Arc<SessionLocks>,
        notifier: Notifier,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            repos,
            locks,
            notifier,
            pacing,
        }
    }

    async fn active_session(&self, session_id: &str) -> Result<Session, QuizError> {
        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;
        if !session.is_active() {
            return Err(QuizError::SessionNotActive);
        }
        Ok(session)
    }

    /// Closes the question, then eliminates every active participant without a
    /// correct answer to it. One or zero survivors finishes the session.
    pub async fn process_round_results(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> Result<RoundOutcome, QuizError> {
        let (outcome, correct_answer) = {
            let _guard = self.locks.exclusive(session_id).await;

            let mut session = self.active_session(session_id).await?;
            let question = self
                .repos
                .questions
                .get_by_id(question_id)
                .await?
                .filter(|q| q.session_id == session_id)
                .ok_or(QuizError::QuestionNotFound)?;

            // no answer can be recorded for this question after this point
            if !self.repos.questions.close(question_id).await? {
                return Err(QuizError::QuestionClosed);
            }

            let answers: HashMap<String, Answer> = self
                .repos
                .answers
                .get_by_question(question_id)
                .await?
                .into_iter()
                .map(|a| (a.user_id.clone(), a))
                .collect();

            let mut survivors = Vec::new();
            let mut eliminated = Vec::new();
            for mut participant in self
                .repos
                .participants
                .get_active_by_session(session_id)
                .await?
            {
                let correct = answers
                    .get(&participant.user_id)
                    .is_some_and(|a| a.is_correct);
                if correct {
                    survivors.push(participant);
                } else {
                    participant.eliminate();
                    self.repos.participants.update(&participant).await?;
                    eliminated.push(participant);
                }
            }
            PARTICIPANTS_ELIMINATED_TOTAL.inc_by(eliminated.len() as u64);

            if survivors.len() <= 1 {
                session.finish()?;
                self.repos.sessions.update(&session).await?;
                record_session_transition("finished");
                tracing::info!(
                    session_id = %session_id,
                    survivors = survivors.len(),
                    "Session finished by elimination"
                );
            }

            tracing::info!(
                session_id = %session_id,
                question_id = %question_id,
                survivors = survivors.len(),
                eliminated = eliminated.len(),
                "Round resolved"
            );

            let outcome = RoundOutcome {
                round: question.round,
                survivors,
                eliminated,
                session,
            };
            (outcome, question.correct_answer)
        };

        self.notifier
            .question_end(session_id, question_id, Some(correct_answer))
            .await;
        self.pacing.hold(PacingPhase::RoundResult).await;
        self.notifier
            .round_result(
                session_id,
                outcome.round,
                &outcome.survivors,
                &outcome.eliminated,
            )
            .await;
        self.notifier.session_update(&outcome.session).await;

        Ok(outcome)
    }

    /// Advances to the next round, or finishes the session when at most one
    /// player is still in.
    pub async fn next_round(&self, session_id: &str) -> Result<Session, QuizError> {
        let session = {
            let _guard = self.locks.exclusive(session_id).await;

            let mut session = self
                .repos
                .sessions
                .get_by_id(session_id)
                .await?
                .ok_or(QuizError::SessionNotFound)?;

            let remaining = self
                .repos
                .participants
                .get_active_by_session(session_id)
                .await?
                .len();

            if session.is_active() && remaining <= 1 {
                session.finish()?;
                record_session_transition("finished");
                tracing::info!(session_id = %session_id, remaining, "Session finished, no contenders left");
            } else {
                session.next_round()?;
                tracing::info!(session_id = %session_id, round = session.current_round, "Next round");
            }
            self.repos.sessions.update(&session).await?;
            session
        };

        self.notifier.session_update(&session).await;
        Ok(session)
    }

    /// Ends the current-round question without revealing the answer and moves on.
    pub async fn skip_question(&self, session_id: &str) -> Result<Session, QuizError> {
        let (session, question_id) = {
            let _guard = self.locks.exclusive(session_id).await;

            let mut session = self.active_session(session_id).await?;
            let question = self
                .repos
                .questions
                .get_by_session_and_round(session_id, session.current_round)
                .await?
                .ok_or(QuizError::QuestionNotFound)?;

            self.repos.questions.close(&question.id).await?;
            session.next_round()?;
            self.repos.sessions.update(&session).await?;

            tracing::info!(
                session_id = %session_id,
                question_id = %question.id,
                round = session.current_round,
                "Question skipped"
            );
            (session, question.id)
        };

        self.notifier.question_end(session_id, &question_id, None).await;
        self.notifier.session_update(&session).await;
        Ok(session)
    }
}
