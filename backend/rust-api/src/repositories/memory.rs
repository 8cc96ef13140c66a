use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    sort_participants, sort_questions, sort_sessions_newest_first, AnswerRepository,
    ParticipantRepository, QuestionRepository, RepoResult, SessionRepository,
};
use crate::error::RepositoryError;
use crate::models::{Answer, Participant, Question, Session};

#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: &Session) -> RepoResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::Duplicate);
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, session: &Session) -> RepoResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> RepoResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sort_sessions_newest_first(&mut sessions);
        Ok(sessions)
    }
}

#[derive(Default)]
pub struct MemoryParticipantRepository {
    participants: RwLock<HashMap<String, Participant>>,
}

impl MemoryParticipantRepository {
    async fn filtered(&self, keep: impl Fn(&Participant) -> bool) -> Vec<Participant> {
        let mut out: Vec<Participant> = self
            .participants
            .read()
            .await
            .values()
            .filter(|p| keep(p))
            .cloned()
            .collect();
        sort_participants(&mut out);
        out
    }
}

#[async_trait]
impl ParticipantRepository for MemoryParticipantRepository {
    async fn create(&self, participant: &Participant) -> RepoResult<()> {
        let mut participants = self.participants.write().await;
        let taken = participants.values().any(|p| {
            p.user_id == participant.user_id && p.session_id == participant.session_id
        });
        if taken || participants.contains_key(&participant.id) {
            return Err(RepositoryError::Duplicate);
        }
        participants.insert(participant.id.clone(), participant.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Participant>> {
        Ok(self.participants.read().await.get(id).cloned())
    }

    async fn update(&self, participant: &Participant) -> RepoResult<()> {
        self.participants
            .write()
            .await
            .insert(participant.id.clone(), participant.clone());
        Ok(())
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        Ok(self.filtered(|p| p.session_id == session_id).await)
    }

    async fn get_active_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        Ok(self
            .filtered(|p| p.session_id == session_id && p.is_active())
            .await)
    }

    async fn get_eliminated_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        Ok(self
            .filtered(|p| p.session_id == session_id && p.is_eliminated())
            .await)
    }

    async fn get_by_user_and_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> RepoResult<Option<Participant>> {
        Ok(self
            .participants
            .read()
            .await
            .values()
            .find(|p| p.user_id == user_id && p.session_id == session_id)
            .cloned())
    }

    async fn count_by_session(&self, session_id: &str) -> RepoResult<usize> {
        Ok(self
            .participants
            .read()
            .await
            .values()
            .filter(|p| p.session_id == session_id)
            .count())
    }

    async fn add_correct_answer(&self, participant_id: &str, points: u32) -> RepoResult<()> {
        let mut participants = self.participants.write().await;
        if let Some(participant) = participants.get_mut(participant_id) {
            participant.add_correct_answer(points);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuestionRepository {
    questions: RwLock<HashMap<String, Question>>,
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn create(&self, question: &Question) -> RepoResult<()> {
        let mut questions = self.questions.write().await;
        if questions.contains_key(&question.id) {
            return Err(RepositoryError::Duplicate);
        }
        questions.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Question>> {
        Ok(self.questions.read().await.get(id).cloned())
    }

    async fn update(&self, question: &Question) -> RepoResult<()> {
        self.questions
            .write()
            .await
            .insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Question>> {
        let mut out: Vec<Question> = self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        sort_questions(&mut out);
        Ok(out)
    }

    async fn get_by_session_and_round(
        &self,
        session_id: &str,
        round: u32,
    ) -> RepoResult<Option<Question>> {
        let mut matching: Vec<Question> = self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.session_id == session_id && q.round == round)
            .cloned()
            .collect();
        sort_questions(&mut matching);
        // latest question generated for the round wins
        Ok(matching.pop())
    }

    async fn close(&self, id: &str) -> RepoResult<bool> {
        let mut questions = self.questions.write().await;
        match questions.get_mut(id) {
            Some(question) if question.closed_at.is_none() => {
                question.closed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryAnswerRepository {
    answers: RwLock<HashMap<String, Answer>>,
}

impl MemoryAnswerRepository {
    async fn filtered(&self, keep: impl Fn(&Answer) -> bool) -> Vec<Answer> {
        let mut out: Vec<Answer> = self
            .answers
            .read()
            .await
            .values()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.answered_at.cmp(&b.answered_at));
        out
    }
}

#[async_trait]
impl AnswerRepository for MemoryAnswerRepository {
    async fn create(&self, answer: &Answer) -> RepoResult<()> {
        let mut answers = self.answers.write().await;
        let taken = answers
            .values()
            .any(|a| a.user_id == answer.user_id && a.question_id == answer.question_id);
        if taken || answers.contains_key(&answer.id) {
            return Err(RepositoryError::Duplicate);
        }
        answers.insert(answer.id.clone(), answer.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Answer>> {
        Ok(self.answers.read().await.get(id).cloned())
    }

    async fn get_by_user_and_question(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> RepoResult<Option<Answer>> {
        Ok(self
            .answers
            .read()
            .await
            .values()
            .find(|a| a.user_id == user_id && a.question_id == question_id)
            .cloned())
    }

    async fn get_by_question(&self, question_id: &str) -> RepoResult<Vec<Answer>> {
        Ok(self.filtered(|a| a.question_id == question_id).await)
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Answer>> {
        Ok(self.filtered(|a| a.session_id == session_id).await)
    }
}
